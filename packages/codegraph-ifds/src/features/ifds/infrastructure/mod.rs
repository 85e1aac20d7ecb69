//! Runtime machinery: storages, runners, the dependency controller

pub mod bidi_runner;
pub mod dependency_controller;
pub mod inbox;
pub mod reversed_graph;
pub mod runner;
pub mod runner_factory;
pub mod summary_storage;
pub mod unit_resolvers;
pub mod work_tracker;

pub use bidi_runner::{BidiMode, BidiRunnerFactory};
pub use dependency_controller::{ControllerEvent, DependencyController, DependencyReport};
pub use inbox::{InboxReceiver, RunnerInbox, RunnerMessage};
pub use reversed_graph::ReversedGraph;
pub use runner::{
    IfdsUnitRunner, RunnerLaunch, RunnerOptions, RunnerStats, WorklistOrder,
};
pub use runner_factory::{BaseRunnerFactory, IfdsUnitRunnerFactory, RunnerTask};
pub use summary_storage::{SummaryStorage, SummaryStorages};
pub use unit_resolvers::{
    ClassUnitResolver, FnUnitResolver, MethodUnitResolver, PackageUnitResolver, QualifiedMethod,
    SingletonUnit, SingletonUnitResolver,
};
pub use work_tracker::WorkTracker;
