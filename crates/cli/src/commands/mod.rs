pub mod agent;
pub mod onboard;
pub mod policy;
pub mod run;
pub mod status;
