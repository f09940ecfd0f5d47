use std::collections::BTreeMap;

use crate::{error::HarnessError, layers::Param, math::tensor::Tensor};

/// Snapshot of named parameter values, as stored in checkpoints.
pub type StateDict = BTreeMap<String, Tensor>;

pub fn collect_state(params: Vec<(String, &mut Param)>) -> StateDict {
    params
        .into_iter()
        .map(|(name, p)| (name, p.value.clone()))
        .collect()
}

/// Copies every entry of `state` into the matching parameter.
///
/// Fails if a parameter is missing from `state` or has a different shape;
/// nothing is modified in that case.
pub fn restore_state(params: Vec<(String, &mut Param)>, state: &StateDict) -> Result<(), HarnessError> {
    for (name, p) in &params {
        match state.get(name) {
            None => return Err(HarnessError::StateDict(format!("missing parameter `{name}`"))),
            Some(t) if t.shape != p.value.shape => {
                return Err(HarnessError::StateDict(format!(
                    "parameter `{name}` has shape {:?}, checkpoint has {:?}",
                    p.value.shape, t.shape
                )))
            }
            Some(_) => {}
        }
    }
    for (name, p) in params {
        p.value = state[&name].clone();
        p.zero_grad();
    }
    Ok(())
}
