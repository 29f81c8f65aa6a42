// Test suite for the orchestration core. Fakes and the wired-up harness
// live in fixtures; behavior tests are grouped by component under unit/.

pub mod unit;
