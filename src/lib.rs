
//! Binpick is a task-orchestration toolbox for shelf pick-and-place
//! manipulation: a dual-arm robot selects items from labeled shelf bins,
//! senses their pose, plans grasps, executes the resulting trajectories, and
//! places the items in an order tote.
//!
//! The crate centers on two pieces: the frame-polled execution automaton
//! (`execution_modules::automaton`) that sequences sensing, grasp planning,
//! execution, grasp evaluation with bounded retries, and recovery; and the
//! task-planning layer (`planning_modules`) that resolves maneuver queries by
//! composing calls into motion-planning, inverse-kinematics, and grasp
//! evaluation services.  The low-level planners, collision checking, sensing,
//! and actuation are consumed through trait seams and injected by the host.

pub mod execution_modules;
pub mod planning_modules;
pub mod task_modules;
pub mod utils;
