// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithmeticOperator {
    Addition = 1,
    Subtraction = 2,
    Multiplication = 3,
    Division = 4,
}

impl ArithmeticOperator {
    fn all() -> [Self; 4] {
        [Self::Addition, Self::Subtraction, Self::Multiplication, Self::Division]
    }

    fn from_value(value: i64) -> Option<Self> {
        Self::all().into_iter().find(|operator| *operator as i64 == value)
    }

    fn select_options() -> Vec<flownode_api::function::SelectOption> {
        Self::all()
            .into_iter()
            .map(|operator| flownode_api::function::SelectOption {
                label: format!("{:?}", operator).to_lowercase(),
                value: serde_json::json!(operator as i64),
            })
            .collect()
    }
}

/// Receives numbers and applies the selected arithmetic operation to them.
pub struct MathCalcu {}

impl MathCalcu {
    fn calculate(operator: ArithmeticOperator, numbers: &[i64]) -> Option<i64> {
        let mut result = numbers[0];
        for number in &numbers[1..] {
            result = match operator {
                ArithmeticOperator::Addition => result.checked_add(*number)?,
                ArithmeticOperator::Subtraction => result.checked_sub(*number)?,
                ArithmeticOperator::Multiplication => result.checked_mul(*number)?,
                ArithmeticOperator::Division => result.checked_div(*number)?,
            };
        }
        Some(result)
    }
}

#[async_trait::async_trait]
impl flownode_api::function::FunctionInterface for MathCalcu {
    fn ipt_config(&self) -> Vec<flownode_api::function::FunctionIpt> {
        vec![
            flownode_api::function::FunctionIpt {
                key: String::from("numbers"),
                display: String::from("int numbers"),
                must: true,
                components: vec![flownode_api::function::IptComponent {
                    value_type: flownode_api::function::ValueType::Int,
                    formcontrol_type: flownode_api::function::FormControlType::Input,
                    hint: String::from("input integer numbers"),
                    default_value: None,
                    allow_multi: true,
                    select_options: vec![],
                    value: None,
                }],
            },
            flownode_api::function::FunctionIpt {
                key: String::from("arithmetic_operator"),
                display: String::from("choose arithmetic operators"),
                must: true,
                components: vec![flownode_api::function::IptComponent {
                    value_type: flownode_api::function::ValueType::Int,
                    formcontrol_type: flownode_api::function::FormControlType::Select,
                    hint: String::from("+/-/*/%"),
                    default_value: None,
                    allow_multi: false,
                    select_options: ArithmeticOperator::select_options(),
                    value: None,
                }],
            },
        ]
    }

    fn opt_config(&self) -> Vec<flownode_api::function::FunctionOpt> {
        vec![flownode_api::function::FunctionOpt {
            key: String::from("result"),
            description: String::from("arithmetic operation result"),
            value_type: flownode_api::function::ValueType::Int,
            is_array: false,
        }]
    }

    fn all_progress_milestones(&self) -> Vec<String> {
        vec![String::from("parsing ipt"), String::from("in calculation"), String::from("finished")]
    }

    async fn run(&self, ipts: Vec<flownode_api::function::FunctionIpt>, mut event_sender: flownode_api::function_run::RunEventSender) {
        event_sender.report_log(flownode_api::function_run::LogLevel::Info, "start").await;
        event_sender.report_progress_milestone(0).await;

        let numbers: Vec<i64> = match ipts
            .first()
            .and_then(|ipt| ipt.components.first())
            .and_then(|component| component.value.as_ref())
            .and_then(|value| value.as_array())
            .map(|elements| elements.iter().filter_map(|element| element.as_i64()).collect::<Vec<i64>>())
        {
            Some(numbers) if !numbers.is_empty() => numbers,
            _ => {
                event_sender
                    .report_finished(flownode_api::function_run::FunctionRunOpt::fail_intercept_opt("parse ipt `numbers` failed"))
                    .await;
                return;
            }
        };

        let operator_value = ipts
            .get(1)
            .and_then(|ipt| ipt.components.first())
            .and_then(|component| component.value.clone())
            .unwrap_or(serde_json::Value::Null);
        let operator = match operator_value.as_i64().and_then(ArithmeticOperator::from_value) {
            Some(operator) => operator,
            None => {
                event_sender
                    .report_finished(flownode_api::function_run::FunctionRunOpt::fail_intercept_opt(&format!(
                        "arithmetic_operator({}) not in [1, 2, 3, 4]",
                        operator_value
                    )))
                    .await;
                return;
            }
        };

        event_sender.report_progress_milestone(1).await;
        let result = match Self::calculate(operator, &numbers) {
            Some(result) => result,
            None => {
                event_sender
                    .report_finished(flownode_api::function_run::FunctionRunOpt::fail_intercept_opt(
                        "arithmetic overflow or division by zero",
                    ))
                    .await;
                return;
            }
        };

        event_sender.report_progress_milestone(2).await;
        event_sender
            .report_finished(flownode_api::function_run::FunctionRunOpt::suc_opt(
                &format!("received {} numbers", numbers.len()),
                std::collections::HashMap::from([(String::from("result"), serde_json::json!(result))]),
            ))
            .await;
    }
}
