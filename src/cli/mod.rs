mod args;
mod output;

pub use args::{parse_args, Command, USAGE};
pub use output::{render_history, render_ranked, render_report, render_report_page};
