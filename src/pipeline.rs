//! Orchestration entry point: wires the five components over one
//! [`Module`], the way [`cranelift_codegen::Context`] wires compilation
//! over one `Function` (spec.md §2, "Data flow").
//!
//! `PipelineConfig` is the in-process configuration surface this crate
//! uses in place of the CLI/pass-manager wiring spec.md §1 excludes — a
//! library caller configures a `Pipeline`, it doesn't parse flags.

use crate::cha::ClassHierarchyAnalysis;
use crate::encode::TypeEncoder;
use crate::funcid::{assign_function_ids, AssignOutcome};
use crate::ir::Module;
use crate::landingpad::{materialize_module, MaterializeStats};
use crate::policy::FailurePolicy;
use crate::record::{CallSiteRecord, FunctionRecord};
use crate::retcheck::{build_check_chain, CheckChain};
use hashbrown::HashMap;
use std::path::PathBuf;

/// The static-ID ceiling, failure policy, and output path hint a caller
/// selects once per `Pipeline`, replacing the excluded CLI surface
/// (spec.md §1; SPEC_FULL.md §9).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Chosen failure policy for every return check this run installs.
    pub failure_policy: FailurePolicy,
    /// Where `stats.rs`'s CSV reports are written, e.g. `build/out` to
    /// produce `build/out-Backend.csv` / `build/out-SDStats.csv`.
    pub output_base: PathBuf,
    /// Reserved type-ID ceiling the [`TypeEncoder`] counts down from.
    /// Spec.md reserves `0x7FFFF` for [`crate::record::UNKNOWN_ID`], so the
    /// default ceiling sits one below it.
    pub type_id_ceiling: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            failure_policy: FailurePolicy::default(),
            output_base: PathBuf::from("sd-retcfi-out"),
            type_id_ceiling: 0x7_FFFE,
        }
    }
}

/// Everything one pipeline run over one module produced, for a caller (or
/// test) to inspect without re-deriving it.
pub struct PipelineOutput {
    pub function_records: HashMap<String, FunctionRecord>,
    pub assign_outcomes: Vec<AssignOutcome>,
    pub call_sites: HashMap<String, CallSiteRecord>,
    pub check_chains: HashMap<String, CheckChain>,
    pub materialize_stats: MaterializeStats,
}

/// Persistent allocator state reused across modules in a batch/LTO-style
/// run, mirroring `cranelift_codegen::Context` holding allocations across
/// function compilations (spec.md §5: two pipelines over two modules never
/// interact, so nothing here is process-global).
pub struct Pipeline {
    config: PipelineConfig,
    type_encoder: TypeEncoder,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let type_encoder = TypeEncoder::new(config.type_id_ceiling);
        Pipeline {
            config,
            type_encoder,
        }
    }

    /// Run the full A→B→C→D→E pipeline over `module`, using `cha` for
    /// virtual-method IDs (spec.md §2's full data flow).
    pub fn run(
        &mut self,
        module: &mut Module,
        cha: &impl ClassHierarchyAnalysis,
    ) -> PipelineOutput {
        log::debug!("pipeline: assigning function ids");
        let (mut function_records, assign_outcomes) =
            assign_function_ids(module, cha, &mut self.type_encoder);

        log::debug!("pipeline: analyzing call sites");
        let analysis = crate::callsite::analyze_call_sites(
            module,
            &function_records,
            &mut self.type_encoder,
        );

        log::debug!("pipeline: building return checks");

        let mut check_chains = HashMap::new();
        for function in module.functions() {
            let name = function.mangled_name.as_str();
            let Some(record) = function_records.get_mut(name) else {
                continue;
            };
            if function.returns().is_empty() {
                record.flags |= crate::record::FunctionFlags::NO_RETURN;
            }
            if !analysis.reachable_callees.contains(name) {
                record.flags |= crate::record::FunctionFlags::NO_CALLER;
            }
            if matches!(
                function.linkage,
                crate::ir::Linkage::External | crate::ir::Linkage::Weak
            ) {
                record.flags |= crate::record::FunctionFlags::EXTERNAL;
            }
            if let Some(chain) = build_check_chain(record, self.config.failure_policy) {
                check_chains.insert(name.to_string(), chain);
            }
        }

        log::debug!("pipeline: materializing landing pads");
        let (_, materialize_stats) = materialize_module(module, &analysis.sites);

        if analysis.pseudo_locs_assigned > 0 {
            log::debug!(
                "pipeline: {} call sites needed a pseudo debug location",
                analysis.pseudo_locs_assigned
            );
        }

        PipelineOutput {
            function_records,
            assign_outcomes,
            call_sites: analysis.sites,
            check_chains,
            materialize_stats,
        }
    }

    /// Write the CSV reports for one run's output to the configured base
    /// path (spec.md §6, "CSV outputs").
    pub fn write_reports(
        &self,
        output: &PipelineOutput,
    ) -> Result<(PathBuf, PathBuf), crate::errors::SdError> {
        crate::stats::write_reports(
            &self.config.output_base,
            &output.materialize_stats,
            &output.function_records,
        )
        .map_err(crate::errors::SdError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cha::StaticCha;
    use crate::ir::{Callee, DebugLoc, Function, InstData, Signature, TypeCode};

    #[test]
    fn full_pipeline_scenario_s1() {
        let mut module = Module::new();
        let mut caller = Function::new(
            "_Z6callerv",
            Signature {
                params: vec![],
                ret: TypeCode::Void,
            },
        );
        let block = caller.create_block();
        caller.push_inst(
            block,
            InstData::Call {
                callee: Callee::Direct("_ZN3Foo3fooEv".into()),
                debug_loc: Some(DebugLoc::Real {
                    file: "main.cpp".into(),
                    line: 10,
                    col: 3,
                }),
            },
        );
        module.declare_function(caller);

        let mut callee = Function::new(
            "_ZN3Foo3fooEv",
            Signature {
                params: vec![],
                ret: TypeCode::Void,
            },
        );
        let cb = callee.create_block();
        callee.push_inst(cb, InstData::Return);
        module.declare_function(callee);

        let cha = StaticCha::new().with_max_id(10);
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let output = pipeline.run(&mut module, &cha);

        assert_eq!(output.function_records["_ZN3Foo3fooEv"].ids.as_slice(), &[11]);
        assert!(output.check_chains.contains_key("_ZN3Foo3fooEv"));
        assert_eq!(output.materialize_stats.id_hit_counts[&11], 1);
    }

    #[test]
    fn diamond_call_site_does_not_flag_either_overrider_no_caller() {
        // One virtual call site with two possible targets (the S2 diamond
        // shape): both `_ZN1B1gEv` and `_ZN1D1gEv` are genuinely reachable
        // through this dispatch, so neither should end up with
        // `FunctionFlags::NO_CALLER` just because the site's own
        // `callee_name` diagnostic hint only names the first.
        let mut module = Module::new();
        let mut caller = Function::new(
            "_Z6callerv",
            Signature {
                params: vec![],
                ret: TypeCode::Void,
            },
        );
        let block = caller.create_block();
        caller.push_inst(
            block,
            InstData::Call {
                callee: Callee::Virtual {
                    possible_targets: vec!["_ZN1B1gEv".into(), "_ZN1D1gEv".into()],
                },
                debug_loc: Some(DebugLoc::Real {
                    file: "a.cpp".into(),
                    line: 1,
                    col: 1,
                }),
            },
        );
        module.declare_function(caller);

        for name in ["_ZN1B1gEv", "_ZN1D1gEv"] {
            let mut f = Function::new(
                name,
                Signature {
                    params: vec![],
                    ret: TypeCode::Void,
                },
            );
            let b = f.create_block();
            f.push_inst(b, InstData::Return);
            module.declare_function(f);
        }

        let cha = StaticCha::new()
            .with_virtual("_ZN1B1gEv", vec![3])
            .with_virtual("_ZN1D1gEv", vec![3, 7]);
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let output = pipeline.run(&mut module, &cha);

        for name in ["_ZN1B1gEv", "_ZN1D1gEv"] {
            let record = &output.function_records[name];
            assert!(
                !record.flags.contains(crate::record::FunctionFlags::NO_CALLER),
                "{name} incorrectly flagged NO_CALLER"
            );
        }
    }
}
