//! FFI types and function signatures for host interop
//!
//! This module defines the C ABI types used between the native host and
//! the bridge, plus the symbols a script module exports. All types that
//! cross the boundary use `#[repr(C)]`.

use serde::{Deserialize, Serialize};
use std::ffi::{c_char, c_void};
use std::ops::{Add, Mul, Neg, Sub};

/// API version for compatibility checking
pub const VOID_BRIDGE_API_VERSION: u32 = 1;

/// Bridge build version embedded into every exported module.
///
/// Modules exchange Rust trait objects with the bridge, so both sides must
/// come from the same bridge build.
pub const VOID_BRIDGE_BUILD_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Symbol returning [`FfiModuleInfo`]
pub const MODULE_INFO_SYMBOL: &[u8] = b"void_script_module_info\0";

/// Symbol registering the module's types into a catalog
pub const MODULE_REGISTER_SYMBOL: &[u8] = b"void_script_module_register\0";

/// Vector3 for FFI (matches the host's `Vector3`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0, z: 1.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0, z: 0.0 };
    pub const FORWARD: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Transform for FFI. Rotation is euler angles in degrees.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub const fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Host callback: read the transform of an entity into `out`
pub type HostGetTransformFn = extern "C" fn(user_data: *mut c_void, entity: u64, out: *mut Transform);

/// Host callback: write the transform of an entity
pub type HostSetTransformFn = extern "C" fn(user_data: *mut c_void, entity: u64, transform: *const Transform);

/// Host callback: query whether an entity carries a component kind
pub type HostHasComponentFn = extern "C" fn(user_data: *mut c_void, entity: u64, kind: *const c_char) -> bool;

/// Host callback: log sink for script messages
pub type HostLogFn = extern "C" fn(user_data: *mut c_void, message: *const c_char);

/// Interop table filled in by a native host.
///
/// Every slot is optional. `user_data` is passed back verbatim to each
/// callback and must stay valid until the table is cleared.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiInteropTable {
    pub user_data: *mut c_void,
    pub get_transform: Option<HostGetTransformFn>,
    pub set_transform: Option<HostSetTransformFn>,
    pub has_component: Option<HostHasComponentFn>,
    pub log: Option<HostLogFn>,
}

impl Default for FfiInteropTable {
    fn default() -> Self {
        Self {
            user_data: std::ptr::null_mut(),
            get_transform: None,
            set_transform: None,
            has_component: None,
            log: None,
        }
    }
}

/// Module info returned by `void_script_module_info`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiModuleInfo {
    /// API version
    pub api_version: u32,
    /// Bridge build version the module was compiled against (null-terminated)
    pub bridge_version: *const c_char,
    /// Module name (null-terminated)
    pub name: *const c_char,
    /// Module version string (null-terminated)
    pub version: *const c_char,
    /// Native libraries the module needs, `;`-separated (null-terminated, may be null)
    pub native_dependencies: *const c_char,
}

/// Type alias for the module info function
pub type GetModuleInfoFn = extern "C" fn() -> FfiModuleInfo;

/// Type alias for the module registration function. Returns false if
/// registration panicked.
///
/// The catalog is a Rust type; the module must be built with the same
/// compiler and bridge version (checked through `bridge_version`).
#[allow(improper_ctypes_definitions)]
pub type RegisterModuleFn = unsafe extern "C" fn(catalog: *mut crate::catalog::TypeCatalog) -> bool;

/// Export a script module from a `cdylib` crate.
///
/// ```ignore
/// fn register(catalog: &mut void_bridge::TypeCatalog) {
///     catalog.entity("Game.PlayerController")
///         .with_id(|id| Ok(Box::new(PlayerController::new(id))))
///         .register();
/// }
///
/// void_bridge::export_script_module!("game_scripts", register);
/// ```
#[macro_export]
macro_rules! export_script_module {
    ($name:expr, $register:path) => {
        $crate::export_script_module!($name, $register, []);
    };
    ($name:expr, $register:path, [$($native:expr),* $(,)?]) => {
        #[no_mangle]
        pub extern "C" fn void_script_module_info() -> $crate::ffi::FfiModuleInfo {
            $crate::ffi::FfiModuleInfo {
                api_version: $crate::ffi::VOID_BRIDGE_API_VERSION,
                bridge_version: $crate::ffi::VOID_BRIDGE_BUILD_VERSION.as_ptr() as *const ::std::ffi::c_char,
                name: concat!($name, "\0").as_ptr() as *const ::std::ffi::c_char,
                version: concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const ::std::ffi::c_char,
                native_dependencies: concat!($($native, ";",)* "\0").as_ptr() as *const ::std::ffi::c_char,
            }
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn void_script_module_register(catalog: *mut $crate::catalog::TypeCatalog) -> bool {
            match catalog.as_mut() {
                Some(catalog) => $crate::guard::catch_panic(|| $register(catalog)).is_ok(),
                None => false,
            }
        }
    };
}
