//! Stdout hand-off between pipeline steps.
//!
//! Steps share no runtime state. Each one ends by printing an
//! `export NAME="value"` line that the operator pastes into their shell
//! before running the next step; the next step reads the variable back
//! through its config. This block is the whole inter-process protocol.

/// Format a shell export statement for a produced identifier.
pub fn export_line(name: &str, value: &str) -> String {
    format!("export {}=\"{}\"", name, value)
}

/// Print the operator hand-off block for a produced identifier.
pub fn print_handoff(name: &str, value: &str) {
    println!();
    println!("Please execute the following command");
    println!("{}", export_line(name, value));
    println!();
}
