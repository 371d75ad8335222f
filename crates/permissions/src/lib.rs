//! Simple, macOS-only Accessibility permission checks.
//!
//! AX observers can be created without the Accessibility permission, but the
//! OS then never delivers notifications to them. Hosts call
//! [`accessibility_ok`] before installing per-app handlers and may ask the
//! system to show its consent dialog with [`request_accessibility`].
#![cfg(target_os = "macos")]

use core_foundation::{
    base::TCFType,
    boolean::CFBoolean,
    dictionary::{CFDictionary, CFDictionaryRef},
    string::CFString,
};

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
}

/// Check if the process has the Accessibility permission. No side effects.
pub fn accessibility_ok() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Check the Accessibility permission, asking the system to prompt the user
/// when it is missing.
///
/// The prompt is asynchronous: the return value reflects the state at call
/// time, so a `false` result stays `false` until the user acts and the
/// process checks again.
pub fn request_accessibility() -> bool {
    let key = CFString::from_static_string("AXTrustedCheckOptionPrompt");
    let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}
