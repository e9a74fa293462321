pub mod login_as;
pub mod serve;
