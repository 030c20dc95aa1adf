pub mod job;

pub use job::ReportJob;
