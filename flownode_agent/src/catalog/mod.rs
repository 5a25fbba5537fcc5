// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT


/// A runnable capability registered by this agent. The catalog's definitions
/// are immutable after id binding; `clone_for_invocation` hands out a copy
/// whose input slots the invocation may fill without touching shared state.
#[derive(Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub group_name: String,
    pub description: String,
    pub ipts: Vec<flownode_api::function::FunctionIpt>,
    pub opts: Vec<flownode_api::function::FunctionOpt>,
    pub progress_milestones: Vec<String>,
    pub id: Option<String>,
    pub exe_func: std::sync::Arc<dyn flownode_api::function::FunctionInterface>,
}

impl FunctionDefinition {
    fn to_spec(&self) -> flownode_api::function::FunctionSpec {
        flownode_api::function::FunctionSpec {
            name: self.name.clone(),
            group_name: self.group_name.clone(),
            description: self.description.clone(),
            ipts: self.ipts.clone(),
            opts: self.opts.clone(),
            progress_milestones: self.progress_milestones.clone(),
            id: self.id.clone(),
        }
    }
}

/// Namespace for related functions. A second definition with the same name
/// in the same group is rejected at insertion time.
pub struct FunctionGroup {
    pub name: String,
    functions: Vec<FunctionDefinition>,
}

impl FunctionGroup {
    pub fn add_function(
        &mut self,
        name: &str,
        description: &str,
        exe_func: std::sync::Arc<dyn flownode_api::function::FunctionInterface>,
    ) -> anyhow::Result<()> {
        if self.functions.iter().any(|function| function.name == name) {
            anyhow::bail!("function '{}' already registered in group '{}'", name, self.name);
        }
        self.functions.push(FunctionDefinition {
            name: name.to_string(),
            group_name: self.name.clone(),
            description: description.to_string(),
            ipts: exe_func.ipt_config(),
            opts: exe_func.opt_config(),
            progress_milestones: exe_func.all_progress_milestones(),
            id: None,
            exe_func,
        });
        Ok(())
    }

    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.functions
    }
}

/// In-memory registry of all function groups declared by this agent.
#[derive(Default)]
pub struct FunctionCatalog {
    groups: Vec<FunctionGroup>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self { groups: vec![] }
    }

    pub fn register_function_group(&mut self, group_name: &str) -> anyhow::Result<&mut FunctionGroup> {
        if self.groups.iter().any(|group| group.name == group_name) {
            anyhow::bail!("function group '{}' already registered", group_name);
        }
        self.groups.push(FunctionGroup {
            name: group_name.to_string(),
            functions: vec![],
        });
        Ok(self.groups.last_mut().unwrap())
    }

    pub fn groups(&self) -> &[FunctionGroup] {
        &self.groups
    }

    /// Snapshot the catalog into the registration request for `who`.
    pub fn to_register_request(&self, who: &str) -> flownode_api::function::RegisterFunctionsRequest {
        let mut group_name_map_functions = std::collections::HashMap::new();
        for group in &self.groups {
            group_name_map_functions.insert(
                group.name.clone(),
                group.functions.iter().map(|function| function.to_spec()).collect(),
            );
        }
        flownode_api::function::RegisterFunctionsRequest {
            who: who.to_string(),
            group_name_map_functions,
        }
    }

    /// Copy the server-assigned id of every function from the registration
    /// response onto the local definitions. A local function without an id
    /// in the response means the local catalog and the coordinator's view
    /// have diverged, which the caller must treat as fatal on startup.
    pub fn bind_server_ids(&mut self, response: &flownode_api::function::RegisterFunctionsResponse) -> anyhow::Result<()> {
        for group in &mut self.groups {
            let response_functions = response.group_name_map_functions.get(&group.name);
            for function in &mut group.functions {
                let response_spec = response_functions.and_then(|functions| functions.iter().find(|spec| spec.name == function.name));
                match response_spec.and_then(|spec| spec.id.clone()) {
                    Some(id) if !id.is_empty() => function.id = Some(id),
                    _ => anyhow::bail!("coordinator returned no id for function '{}-{}'", group.name, function.name),
                }
            }
        }
        Ok(())
    }

    /// First definition across all groups carrying the given server-assigned
    /// id, as an independent per-invocation copy.
    pub fn clone_for_invocation(&self, function_id: &str) -> Option<FunctionDefinition> {
        for group in &self.groups {
            for function in &group.functions {
                if function.id.as_deref() == Some(function_id) {
                    return Some(function.clone());
                }
            }
        }
        None
    }
}
