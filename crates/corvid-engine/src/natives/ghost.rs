//! Ghost tag natives
//!
//! Guest types are passed by name and resolved through
//! [`Bridge::guest_type`](crate::bridge::Bridge::guest_type).

use crate::ghost::throw_class_cast;
use crate::host::bootstrap;
use crate::host::HostValue;

use super::{arg_int, arg_opt_ref, arg_ref, arg_str, NativeFunctionRegistry};

const GHOST_TAG: &str = "corvid.runtime.GhostTag";

fn rank(args: &[HostValue], index: usize) -> corvid_sdk::BridgeResult<u32> {
    let rank = arg_int(args, index)?;
    u32::try_from(rank).map_err(|_| corvid_sdk::BridgeError::wrong_kind("array rank", rank.to_string()))
}

/// Register the ghost tag natives:
/// - `setTag(Object obj, String type)V`
/// - `getTag(Object obj)String`
/// - `isGhostArrayInstance(Object obj, String type, I rank)Z`
/// - `castGhostArray(Object obj, String type, I rank)V`
/// - `throwClassCastException(Object obj, String type, I rank)V`
pub fn register_ghost(registry: &mut NativeFunctionRegistry) {
    registry.register(&format!("{}.setTag", GHOST_TAG), |bridge, args| {
        let obj = arg_ref(args, 0, "setTag")?;
        let tag = bridge.guest_type(arg_str(args, 1, "setTag")?)?;
        bridge.tags().set_tag(obj, tag);
        Ok(HostValue::Null)
    });

    registry.register(&format!("{}.getTag", GHOST_TAG), |bridge, args| {
        let obj = arg_ref(args, 0, "getTag")?;
        match bridge.tags().get_tag(obj) {
            Some(tag) => Ok(HostValue::Ref(bootstrap::new_string(tag.name())?)),
            None => Ok(HostValue::Null),
        }
    });

    registry.register(&format!("{}.isGhostArrayInstance", GHOST_TAG), |bridge, args| {
        let tag = bridge.guest_type(arg_str(args, 1, "isGhostArrayInstance")?)?;
        let rank = rank(args, 2)?;
        let result = match arg_opt_ref(args, 0)? {
            Some(obj) => bridge.tags().is_ghost_array_instance(obj, &tag, rank),
            None => false,
        };
        Ok(HostValue::Boolean(result))
    });

    registry.register(&format!("{}.castGhostArray", GHOST_TAG), |bridge, args| {
        let tag = bridge.guest_type(arg_str(args, 1, "castGhostArray")?)?;
        let rank = rank(args, 2)?;
        bridge.tags().cast_ghost_array(arg_opt_ref(args, 0)?, &tag, rank)?;
        Ok(HostValue::Null)
    });

    registry.register(&format!("{}.throwClassCastException", GHOST_TAG), |bridge, args| {
        let obj = arg_ref(args, 0, "throwClassCastException")?;
        let tag = bridge.guest_type(arg_str(args, 1, "throwClassCastException")?)?;
        Err(throw_class_cast(obj.class_name(), &tag, rank(args, 2)?))
    });
}
