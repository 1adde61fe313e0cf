/// Process exit codes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const OPERATIONAL_FAILURE: i32 = 1;
    /// The plan has conflicts, so nothing was applied.
    pub const CONFLICTS: i32 = 2;
    /// Apply failed and the batch was rolled back.
    pub const TRANSACTIONAL_FAILURE: i32 = 3;
}
