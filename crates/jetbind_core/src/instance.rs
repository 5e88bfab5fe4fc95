//! Engine instances.

use std::ffi::CString;
use std::sync::Arc;

use jetbind_sys::codes::JET_errInvalidParameter;
use jetbind_sys::{InitGrbit, InstanceHandle, JetApi, Param, SessionHandle, TermGrbit};

use crate::config::{InstanceConfig, ParamValue};
use crate::error::JetResult;
use crate::resource::{HandleKind, Resource, ResourceKind};
use crate::session::Session;
use crate::status;

/// Handle kind for engine instances.
///
/// Allocation creates the instance, applies the configured system
/// parameters and initializes it. If any step fails the half-built instance
/// is terminated before the error is returned.
#[derive(Debug)]
pub struct InstanceKind;

impl HandleKind for InstanceKind {
    type Handle = InstanceHandle;
    type Params = InstanceConfig;

    const KIND: ResourceKind = ResourceKind::Instance;
    const ALLOCATE_OPERATION: &'static str = "JetCreateInstance";
    const RELEASE_OPERATION: &'static str = "JetTerm";

    fn allocate(api: &dyn JetApi, config: &InstanceConfig) -> (i32, InstanceHandle) {
        let mut handle = InstanceHandle::NIL;
        let (Ok(name), Ok(display)) = (config.name_cstring(), config.display_name_cstring())
        else {
            return (JET_errInvalidParameter, handle);
        };

        let code = api.create_instance(&name, display.as_deref(), &mut handle);
        if code < 0 {
            return (code, handle);
        }

        for (param, value) in config.parameters() {
            let code = match value {
                ParamValue::Integer(v) => {
                    api.set_system_parameter(handle, SessionHandle::NIL, param, v, None)
                }
                ParamValue::Text(text) => match CString::new(text) {
                    Ok(text) => api.set_system_parameter(
                        handle,
                        SessionHandle::NIL,
                        param,
                        0,
                        Some(&text),
                    ),
                    Err(_) => JET_errInvalidParameter,
                },
            };
            if code < 0 {
                abandon(api, handle);
                return (code, handle);
            }
        }

        let code = api.init(&mut handle, InitGrbit::NONE);
        if code < 0 {
            abandon(api, handle);
        }
        (code, handle)
    }

    fn release(api: &dyn JetApi, handle: InstanceHandle) -> i32 {
        api.term(handle, TermGrbit::NONE)
    }
}

fn abandon(api: &dyn JetApi, handle: InstanceHandle) {
    let code = api.term(handle, TermGrbit::ABRUPT);
    if code < 0 {
        tracing::debug!(?handle, code, "terminating a partially created instance failed");
    }
}

/// An initialized engine instance.
///
/// Terminated on drop. Sessions borrow the instance, so they are always
/// ended first.
#[derive(Debug)]
pub struct Instance {
    resource: Resource<InstanceKind>,
    name: String,
}

impl Instance {
    /// Creates and initializes an instance.
    pub fn new(api: Arc<dyn JetApi>, config: &InstanceConfig) -> JetResult<Self> {
        config.validate()?;
        let mut resource = Resource::new(api);
        let handle = resource.allocate(config)?;
        tracing::info!(name = %config.name, ?handle, "instance initialized");
        Ok(Self {
            resource,
            name: config.name.clone(),
        })
    }

    /// Creates an instance with default parameters.
    pub fn with_name(api: Arc<dyn JetApi>, name: &str) -> JetResult<Self> {
        Self::new(api, &InstanceConfig::new(name))
    }

    /// The native handle.
    pub fn handle(&self) -> JetResult<InstanceHandle> {
        self.resource.ensure_usable()
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine this instance runs on.
    pub fn api(&self) -> &Arc<dyn JetApi> {
        self.resource.api()
    }

    /// Begins a session.
    pub fn begin_session(&self) -> JetResult<Session<'_>> {
        Session::begin(self)
    }

    /// Reads a system parameter.
    pub fn parameter(&self, param: Param) -> JetResult<ParamValue> {
        let handle = self.handle()?;
        let mut value = 0usize;
        let mut text = vec![0u8; 1024];
        let code = self.api().get_system_parameter(
            handle,
            SessionHandle::NIL,
            param,
            &mut value,
            &mut text,
        );
        status::check(code, "JetGetSystemParameter")?;
        if param.is_string() {
            let end = text.iter().position(|b| *b == 0).unwrap_or(text.len());
            Ok(ParamValue::Text(
                String::from_utf8_lossy(&text[..end]).into_owned(),
            ))
        } else {
            Ok(ParamValue::Integer(value))
        }
    }

    /// Terminates the instance with explicit options.
    ///
    /// The instance is gone afterwards even if the engine reports an error.
    pub fn terminate(mut self, grbit: TermGrbit) -> JetResult<()> {
        let handle = self.handle()?;
        let code = self.api().term(handle, grbit);
        self.resource.mark_released();
        status::check(code, "JetTerm").map(|_| ())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.resource.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JetError;
    use crate::status::ErrorKind;
    use jetbind_sim::SimEngine;

    fn api() -> (Arc<SimEngine>, Arc<dyn JetApi>) {
        let engine = Arc::new(SimEngine::new());
        let api: Arc<dyn JetApi> = engine.clone();
        (engine, api)
    }

    #[test]
    fn create_and_drop() {
        let (engine, api) = api();
        {
            let instance = Instance::with_name(api, "basic").unwrap();
            assert_eq!(instance.name(), "basic");
            assert!(!instance.handle().unwrap().is_nil());
            assert_eq!(engine.open_handle_count(), 1);
        }
        assert_eq!(engine.open_handle_count(), 0);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let (_engine, api) = api();
        let _first = Instance::with_name(api.clone(), "dup").unwrap();
        let err = Instance::with_name(api, "dup").unwrap_err();
        assert!(err.is_native(ErrorKind::InstanceNameInUse));
    }

    #[test]
    fn parameters_are_applied_before_init() {
        let (_engine, api) = api();
        let config = InstanceConfig::new("params")
            .max_sessions(7)
            .base_name("abc");
        let instance = Instance::new(api, &config).unwrap();
        assert_eq!(
            instance.parameter(Param::MaxSessions).unwrap(),
            ParamValue::Integer(7)
        );
        assert_eq!(
            instance.parameter(Param::BaseName).unwrap(),
            ParamValue::Text("abc".into())
        );
    }

    #[test]
    fn invalid_config_never_reaches_engine() {
        let (engine, api) = api();
        let err = Instance::new(api, &InstanceConfig::new("")).unwrap_err();
        assert!(matches!(err, JetError::Config { .. }));
        assert_eq!(engine.stats().calls, 0);
    }

    #[test]
    fn terminate_consumes() {
        let (engine, api) = api();
        let instance = Instance::with_name(api, "term").unwrap();
        instance.terminate(TermGrbit::COMPLETE).unwrap();
        assert_eq!(engine.open_handle_count(), 0);
        assert!(engine.violations().is_empty());
    }
}
