//! Literal end-to-end scenarios S1-S6, run through the full pipeline.

use sd_retcfi::cha::StaticCha;
use sd_retcfi::ir::{Callee, DebugLoc, Function, InstData, Module, Signature, TypeCode};
use sd_retcfi::landingpad::LandingPadEmission;
use sd_retcfi::pipeline::{Pipeline, PipelineConfig};
use sd_retcfi::record::{CallSiteKind, FunctionKind};

fn void_signature() -> Signature {
    Signature {
        params: vec![],
        ret: TypeCode::Void,
    }
}

fn loc(file: &str, line: u32, col: u32) -> DebugLoc {
    DebugLoc::Real {
        file: file.to_string(),
        line,
        col,
    }
}

fn with_return(mut f: Function) -> Function {
    let b = f.create_block();
    f.push_inst(b, InstData::Return);
    f
}

#[test]
fn s1_static_only_module() {
    let mut module = Module::new();
    let mut caller = Function::new("_Z6callerv", void_signature());
    let cb = caller.create_block();
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Direct("_ZN3Foo3fooEv".into()),
            debug_loc: Some(loc("main.cpp", 10, 3)),
        },
    );
    module.declare_function(caller);
    module.declare_function(with_return(Function::new("_ZN3Foo3fooEv", void_signature())));

    let cha = StaticCha::new().with_max_id(10);
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.run(&mut module, &cha);

    let record = &output.function_records["_ZN3Foo3fooEv"];
    assert_eq!(record.kind, FunctionKind::Static);
    assert_eq!(record.ids.as_slice(), &[11]);
    assert_eq!(
        output.call_sites["main.cpp:10:3"].kind,
        CallSiteKind::Static { id: 11 }
    );
}

#[test]
fn s2_diamond_virtual() {
    let mut module = Module::new();
    let mut caller = Function::new("_Z6callerv", void_signature());
    let cb = caller.create_block();
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Virtual {
                possible_targets: vec!["_ZN1D1gEv".into()],
            },
            debug_loc: Some(loc("a.cpp", 1, 1)),
        },
    );
    module.declare_function(caller);
    module.declare_function(with_return(Function::new("_ZN1D1gEv", void_signature())));

    let cha = StaticCha::new().with_virtual("_ZN1D1gEv", vec![3, 7]);
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.run(&mut module, &cha);

    let record = &output.function_records["_ZN1D1gEv"];
    assert_eq!(record.kind, FunctionKind::Virtual);
    assert_eq!(record.ids.as_slice(), &[3, 7]);
    let chain = &output.check_chains["_ZN1D1gEv"];
    assert_eq!(chain.steps.len(), 3);
}

#[test]
fn s3_indirect_call() {
    let mut module = Module::new();
    let mut caller = Function::new("_Z4mainv", void_signature());
    let cb = caller.create_block();
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Indirect {
                signature: Signature {
                    params: vec![TypeCode::Int { bits: 32 }],
                    ret: TypeCode::Void,
                },
            },
            debug_loc: Some(loc("main.cpp", 5, 3)),
        },
    );
    module.declare_function(caller);
    let mut takes_int = Function::new(
        "_Z8takesInti",
        Signature {
            params: vec![TypeCode::Int { bits: 32 }],
            ret: TypeCode::Void,
        },
    );
    takes_int.address_taken = true;
    module.declare_function(with_return(takes_int));

    let cha = StaticCha::new().with_max_id(0);
    let mut pipeline = Pipeline::new(PipelineConfig {
        type_id_ceiling: 0x7_FFFE,
        ..PipelineConfig::default()
    });
    let output = pipeline.run(&mut module, &cha);

    let site = &output.call_sites["main.cpp:5:3"];
    assert_eq!(site.kind, CallSiteKind::Indirect { type_id: 0x7_FFFE });
    assert_eq!(site.callee_name, "__INDIRECT__main.cpp:5:3");

    let record = &output.function_records["_Z8takesInti"];
    assert_eq!(record.type_id, Some(0x7_FFFE));
    let chain = &output.check_chains["_Z8takesInti"];
    // ExactMatch(id) + ExternalRange + IndirectMatch + UnknownSentinel + Fail
    assert_eq!(chain.steps.len(), 5);
}

#[test]
fn s4_calls_without_debug_info_get_distinct_pseudo_locs() {
    let mut module = Module::new();
    let mut caller = Function::new("_Z6callerv", void_signature());
    let cb = caller.create_block();
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Direct("_Z1av".into()),
            debug_loc: None,
        },
    );
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Direct("_Z1bv".into()),
            debug_loc: None,
        },
    );
    module.declare_function(caller);
    module.declare_function(with_return(Function::new("_Z1av", void_signature())));
    module.declare_function(with_return(Function::new("_Z1bv", void_signature())));

    let cha = StaticCha::new().with_max_id(0);
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.run(&mut module, &cha);

    assert_eq!(output.call_sites.len(), 2);
    assert!(output.call_sites.contains_key("1"));
    assert!(output.call_sites.contains_key("2"));
}

#[test]
fn s5_tail_call_emits_no_landing_pad() {
    let mut module = Module::new();
    let mut caller = Function::new("_Z6callerv", void_signature());
    let cb = caller.create_block();
    caller.push_inst(
        cb,
        InstData::Call {
            callee: Callee::Tail("_Z5otherv".into()),
            debug_loc: Some(loc("a.cpp", 1, 1)),
        },
    );
    module.declare_function(caller);
    module.declare_function(with_return(Function::new("_Z5otherv", void_signature())));

    let cha = StaticCha::new().with_max_id(0);
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.run(&mut module, &cha);

    assert_eq!(output.call_sites["a.cpp:1:1"].kind, CallSiteKind::Tail);

    let (emissions, _) =
        sd_retcfi::landingpad::materialize_module(&module, &output.call_sites);
    let caller_fn = module.function_by_name("_Z6callerv").unwrap();
    let call_inst = caller_fn.calls()[0];
    let emission = emissions
        .get(&("_Z6callerv".to_string(), call_inst.as_u32()))
        .copied()
        .unwrap();
    assert_eq!(emission, LandingPadEmission::None);

    // `other`'s own return check is unaffected by being tail-called into.
    assert!(output.check_chains.contains_key("_Z5otherv"));
}

#[test]
fn s6_thunk_installs_same_chain_as_diamond_target() {
    let mut module = Module::new();
    module.declare_function(with_return(Function::new(
        "_ZTh0_N1D1gEv",
        void_signature(),
    )));

    let cha = StaticCha::new().with_virtual("_ZN1D1gEv", vec![3, 7]);
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.run(&mut module, &cha);

    let record = &output.function_records["_ZTh0_N1D1gEv"];
    assert_eq!(record.ids.as_slice(), &[3, 7]);
    let chain = &output.check_chains["_ZTh0_N1D1gEv"];
    assert_eq!(chain.steps.len(), 3);
}
