//! Change detection: per-scope binding definitions, the record plan shared
//! by both modes, the in-process detector and the class generator.

pub mod change_definition_factory;
pub mod codegen;
pub mod definition;
pub mod dynamic_change_detector;
pub mod proto_record;

pub use change_definition_factory::{change_detector_id, create_change_detector_definitions};
pub use codegen::{
    change_detector_class_name, change_detector_factory_expression, ChangeDetectorJitGenerator,
};
pub use definition::*;
pub use dynamic_change_detector::{
    ChangeDetectionError, ChangeDetector, ChangeDetectorFactory, ChangeDispatcher,
    ComponentContext, DynamicChangeDetector, Locals, Pipe, Pipes, SimpleChange, SimpleChanges,
};
pub use proto_record::{ProtoRecord, ProtoRecordPlan, RecordType};
