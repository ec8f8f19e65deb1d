//! Scenario-based tests for stagerun

mod helpers;

mod failure_handling;
mod post_actions;
mod success_chain;
mod variable_substitution;
