//! Change Detector Compiler
//!
//! Turns a parsed template into change detector factories (runtime mode) or
//! detector class sources plus factory expressions (codegen mode).

use log::trace;
use rayon::prelude::*;

use crate::change_detection::{
    change_detector_class_name, change_detector_factory_expression,
    create_change_detector_definitions, ChangeDetectorDefinition, ChangeDetectorFactory,
    ChangeDetectorJitGenerator,
};
use crate::config::ChangeDetectorGenConfig;
use crate::core::ChangeDetectionStrategy;
use crate::directive_metadata::CompileTypeMetadata;
use crate::source_module::SourceExpressions;
use crate::template_ast::TemplateAst;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetectionCompiler {
    gen_config: ChangeDetectorGenConfig,
}

impl ChangeDetectionCompiler {
    pub fn new(gen_config: ChangeDetectorGenConfig) -> Self {
        ChangeDetectionCompiler { gen_config }
    }

    pub fn compile_component_runtime(
        &self,
        component_type: &CompileTypeMetadata,
        strategy: ChangeDetectionStrategy,
        parsed_template: &[TemplateAst],
    ) -> Vec<ChangeDetectorFactory> {
        self.definitions(component_type, strategy, parsed_template)
            .into_iter()
            .map(ChangeDetectorFactory::dynamic)
            .collect()
    }

    pub fn compile_component_codegen(
        &self,
        component_type: &CompileTypeMetadata,
        strategy: ChangeDetectionStrategy,
        parsed_template: &[TemplateAst],
    ) -> SourceExpressions {
        let definitions = self.definitions(component_type, strategy, parsed_template);
        let (declarations, factories): (Vec<String>, Vec<String>) = definitions
            .par_iter()
            .enumerate()
            .map(|(view_index, definition)| {
                let class_name = change_detector_class_name(&component_type.name, view_index);
                let generator = ChangeDetectorJitGenerator::new(definition, class_name);
                (
                    generator.generate_source(),
                    change_detector_factory_expression(generator.class_name()),
                )
            })
            .unzip();
        SourceExpressions::new(declarations, factories)
    }

    fn definitions(
        &self,
        component_type: &CompileTypeMetadata,
        strategy: ChangeDetectionStrategy,
        parsed_template: &[TemplateAst],
    ) -> Vec<ChangeDetectorDefinition> {
        trace!(
            "Compiling change detectors of {} ({:?})",
            component_type.name,
            strategy
        );
        create_change_detector_definitions(component_type, strategy, self.gen_config, parsed_template)
    }
}
