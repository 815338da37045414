pub mod negotiation_tests;
pub mod roster_tests;
