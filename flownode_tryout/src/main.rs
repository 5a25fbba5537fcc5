// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use clap::Parser;

mod math_calcu;

#[derive(Debug, clap::Parser)]
#[command(long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from("tryout.toml"))]
    config_file: String,
    #[arg(short, long, default_value_t = String::from(""))]
    template: String,
}

fn read_conf_from_file(filename: &str) -> anyhow::Result<flownode_agent::AgentSettings> {
    Ok(toml::from_str::<flownode_agent::AgentSettings>(&std::fs::read_to_string(filename)?)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Create a template agent configuration and exit.
    if !args.template.is_empty() {
        anyhow::ensure!(
            !std::path::Path::new(&args.template).exists(),
            "cannot overwrite configuration file: {}",
            args.template
        );
        std::fs::write(&args.template, flownode_agent::flownode_agent_default_conf())?;
        return Ok(());
    }

    let settings = read_conf_from_file(&args.config_file)?;
    let mut agent = flownode_agent::Agent::new(settings);
    let math_group = agent.register_function_group("math")?;
    math_group.add_function(
        "calcu",
        "receive numbers and do certain math operation to them",
        std::sync::Arc::new(math_calcu::MathCalcu {}),
    )?;

    let async_runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(8).enable_all().build()?;
    async_runtime.block_on(agent.run())
}
