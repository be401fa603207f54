mod analyst;

pub use analyst::ReportAnalyst;
