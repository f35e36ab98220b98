use bitflags::bitflags;

bitflags! {
    /// Access flags on methods, as they appear in a dex `class_data_item`
    ///
    /// [0]: https://source.android.com/docs/core/runtime/dex-format#access-flags
    pub struct MethodAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl MethodAccessFlags {
    /// Instance constructors (`<init>`), as opposed to static initializers (`<clinit>`)
    pub fn is_instance_constructor(&self) -> bool {
        self.contains(MethodAccessFlags::CONSTRUCTOR) && !self.contains(MethodAccessFlags::STATIC)
    }
}
