use std::fmt::Debug;

use qrun_quant::QrunError;
use tract_core::internal::*;

/// Something that can be fed inputs and returns outputs.
pub trait Runnable {
    fn run(&self, inputs: TVec<TValue>) -> TractResult<TVec<TValue>>;
}

impl<F> Runnable for F
where
    F: Fn(TVec<TValue>) -> TractResult<TVec<TValue>>,
{
    fn run(&self, inputs: TVec<TValue>) -> TractResult<TVec<TValue>> {
        self(inputs)
    }
}

/// Execution backend for a loaded model.
pub trait Delegate: Debug {
    fn name(&self) -> Cow<'static, str>;
    fn prepare(&self, model: TypedModel) -> TractResult<Box<dyn Runnable>>;
}

/// tract's optimized CPU plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl Delegate for DefaultDelegate {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("default")
    }

    fn prepare(&self, model: TypedModel) -> TractResult<Box<dyn Runnable>> {
        let plan = model.into_optimized()?.into_runnable()?;
        Ok(Box::new(move |inputs: TVec<TValue>| plan.run(inputs)))
    }
}

/// Runs the decluttered model as loaded, skipping optimization passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnoptimizedDelegate;

impl Delegate for UnoptimizedDelegate {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("unoptimized")
    }

    fn prepare(&self, model: TypedModel) -> TractResult<Box<dyn Runnable>> {
        let plan = model.into_runnable()?;
        Ok(Box::new(move |inputs: TVec<TValue>| plan.run(inputs)))
    }
}

pub const NPU_DELEGATE: &str = "npu";

/// Names accepted by `delegate_for_name`.
pub fn delegate_names() -> &'static [&'static str] {
    &["default", "unoptimized"]
}

/// Look a delegate up by name.
///
/// Hardware delegates (`npu`, HTP backend) are not compiled in this build
/// and fail like an unloadable delegate library would.
pub fn delegate_for_name(name: &str) -> TractResult<Box<dyn Delegate>> {
    match name {
        "default" => Ok(Box::new(DefaultDelegate)),
        "unoptimized" => Ok(Box::new(UnoptimizedDelegate)),
        NPU_DELEGATE => Err(QrunError::DelegateUnavailable(format!(
            "{NPU_DELEGATE} (htp backend) is not available in this build, available: {}",
            delegate_names().join(", ")
        ))
        .into()),
        other => Err(QrunError::DelegateUnavailable(format!(
            "unknown delegate {other}, available: {}",
            delegate_names().join(", ")
        ))
        .into()),
    }
}
