pub mod phase_coordinator;
pub mod planner_services;
pub mod task_query_resolver;
