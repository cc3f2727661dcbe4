/// A common error type returned by functions throughout the toolbox.
///
/// `PreconditionViolation` is reserved for programming or configuration defects
/// (unknown task-query stage code, malformed work order, bad context name); the
/// host application must halt on it.  Recoverable planning outcomes (no path
/// found, IK not found, sensing failure) are never errors; they are signaled
/// through the `found_solution`/`found_path` flags on the queries.
#[derive(Clone, Debug)]
pub enum BinpickError {
    GenericError(String),
    IdxOutOfBoundError(String),
    PreconditionViolation(String)
}
impl BinpickError {
    pub fn new_generic_error_str(s: &str, file: &str, line: u32) -> Self {
        let s = format!("ERROR: {} -- File: {}, Line: {}", s, file, line);
        return Self::GenericError(s);
    }
    pub fn new_idx_out_of_bound_error(given_idx: usize, length_of_array: usize, file: &str, line: u32) -> Self {
        let s = format!("ERROR: Index {:?} is too large for the array of length {:?} -- File: {}, Line: {}", given_idx, length_of_array, file, line);
        return Self::IdxOutOfBoundError(s)
    }
    pub fn new_precondition_violation(s: &str, file: &str, line: u32) -> Self {
        let s = format!("FATAL: {} -- File: {}, Line: {}", s, file, line);
        return Self::PreconditionViolation(s);
    }
    /// True for errors that must halt the process rather than be handled.
    pub fn is_fatal(&self) -> bool {
        return match self {
            BinpickError::PreconditionViolation(_) => { true }
            _ => { false }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_violations_are_fatal() {
        let e = BinpickError::new_precondition_violation("unknown stage", file!(), line!());
        assert!(e.is_fatal());
        let e = BinpickError::new_generic_error_str("no path", file!(), line!());
        assert!(!e.is_fatal());
    }
}
