#[derive(Clone, Debug)]
pub struct Settings {
    /// Rewrite instance field accesses and virtual invocations into their quick forms
    pub enable_quickening: bool,

    /// Replace `check-cast`s that verification proved redundant with two `nop`s
    pub enable_check_cast_elision: bool,

    /// Quicken code items that several method declarations share
    ///
    /// Sharers are quickened one at a time and must all agree on the result; an item they
    /// disagree on is restored when the session finishes. With this off, shared code items are
    /// never touched.
    pub quicken_shared_code_items: bool,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            enable_quickening: true,
            enable_check_cast_elision: true,
            quicken_shared_code_items: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}
