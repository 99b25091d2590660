use super::error::WorkflowError;
use crate::component::Provisioner;

/// Find the provisioner whose `repository:tag` equals a detective's next key
pub fn resolve<'a>(
    next: &str,
    provisioners: &'a [Provisioner],
) -> Result<&'a Provisioner, WorkflowError> {
    provisioners
        .iter()
        .find(|p| p.key() == next)
        .ok_or_else(|| WorkflowError::NoMatchingProvisioner {
            next: next.to_string(),
        })
}
