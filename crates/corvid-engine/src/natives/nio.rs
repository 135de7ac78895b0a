//! `sun.nio.ch.FileChannelImpl` and `java.io.FileDescriptor` natives

use crate::host::HostValue;

use super::{arg_int, arg_long, arg_ref, NativeFunctionRegistry};

const FILE_CHANNEL: &str = "sun.nio.ch.FileChannelImpl";

fn channel_native(name: &str) -> String {
    format!("{}.{}", FILE_CHANNEL, name)
}

/// Register the file channel and descriptor natives.
///
/// Argument layouts follow the guest declarations, receiver first:
/// - `initIDs()J`
/// - `map0(this, I prot, J position, J length)J`
/// - `unmap0(J address, J length)I`
/// - `transferTo0(this, FileDescriptor src, J position, J count, FileDescriptor dst)J`
/// - `position0(this, FileDescriptor fd, J offset)J`
/// - `FileDescriptor.flush(FileDescriptor fd)Z`
pub fn register_nio(registry: &mut NativeFunctionRegistry) {
    registry.register(&channel_native("initIDs"), |bridge, _args| {
        let granularity = bridge.init_ids()?;
        Ok(HostValue::Long(granularity as i64))
    });

    registry.register(&channel_native("map0"), |bridge, args| {
        let channel = arg_ref(args, 0, "map0")?;
        let prot = arg_int(args, 1)?;
        let position = arg_long(args, 2)?;
        let length = arg_long(args, 3)?;
        let address = bridge.map0(channel, prot, position, length)?;
        Ok(HostValue::Long(address as i64))
    });

    registry.register(&channel_native("unmap0"), |bridge, args| {
        let address = arg_long(args, 0)?;
        let length = arg_long(args, 1)?;
        bridge.unmap0(address as u64, length as u64)?;
        Ok(HostValue::Int(0))
    });

    registry.register(&channel_native("transferTo0"), |bridge, args| {
        let src = arg_ref(args, 1, "transferTo0")?;
        let position = arg_long(args, 2)?;
        let count = arg_long(args, 3)?;
        let dst = arg_ref(args, 4, "transferTo0")?;
        let status = bridge.transfer_to0(src, position, count, dst)?;
        Ok(HostValue::Long(status.to_raw()))
    });

    registry.register(&channel_native("position0"), |bridge, args| {
        let fd = arg_ref(args, 1, "position0")?;
        let offset = arg_long(args, 2)?;
        Ok(HostValue::Long(bridge.position0(fd, offset)?.to_raw()))
    });

    registry.register("java.io.FileDescriptor.flush", |bridge, args| {
        let fd = arg_ref(args, 0, "flush")?;
        Ok(HostValue::Boolean(bridge.flush(fd)?))
    });
}
