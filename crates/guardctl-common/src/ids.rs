//! Shared identifier validation for jobs and work orders.
//!
//! Both `Job.id` and `WorkOrder.id` are constrained to `[A-Za-z0-9_-]+` and
//! must never contain `..`, so that they are always safe to use as a file
//! name component under `inbox/`, `state/processing/`, `outbox/`.

/// Validate an id against the shared character class used for job and
/// work-order identifiers.
///
/// # Errors
///
/// Returns an error describing why `id` is rejected.
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id must not be empty".to_string());
    }
    if id.contains("..") {
        return Err(format!("id '{id}' must not contain '..'"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "id '{id}' must match [A-Za-z0-9_-]+, found a disallowed character"
        ));
    }
    Ok(())
}

/// Generate a work-order id: `wo-` followed by 8 random hex digits.
#[must_use]
pub fn new_work_order_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("wo-{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_ids() {
        assert!(validate_id("job-1").is_ok());
        assert!(validate_id("Job_42").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_id("").is_err());
    }

    #[test]
    fn rejects_dotdot() {
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("job..1").is_err());
    }

    #[test]
    fn rejects_path_separators() {
        assert!(validate_id("job/1").is_err());
        assert!(validate_id("job 1").is_err());
    }

    #[test]
    fn generates_well_formed_work_order_ids() {
        let id = new_work_order_id();
        assert!(id.starts_with("wo-"));
        assert_eq!(id.len(), "wo-".len() + 8);
        assert!(validate_id(&id).is_ok());
    }
}
