pub mod reasoning;
pub mod risk_analysis;
