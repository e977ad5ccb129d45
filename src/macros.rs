#![allow(unused_macros)]

/// Helper macro for building validation errors anchored at an instruction
///
/// ```rust, ignore
///  return Err(validation_error!(ins, "stack index {} out of bounds", index));
/// ```
macro_rules! validation_error {
    // Single string version
    ($ins:expr, $msg:expr) => {
        crate::Error::Validation {
            offset: $ins.offset,
            kind: $ins.kind,
            message: $msg.to_string(),
        }
    };

    // Format string with arguments version
    ($ins:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Validation {
            offset: $ins.offset,
            kind: $ins.kind,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// Helper macro for rejecting an instruction the current operation cannot handle
///
/// ```rust, ignore
///  _ => return Err(unsupported_error!(ins)),
/// ```
macro_rules! unsupported_error {
    ($ins:expr) => {
        crate::Error::UnsupportedInstruction {
            offset: $ins.offset,
            kind: $ins.kind,
        }
    };
}

/// Helper macro for rejecting non-negative relative stack offsets
///
/// ```rust, ignore
///  let offset = negative_stack_offset!(ins)?;
/// ```
macro_rules! negative_stack_offset {
    ($ins:expr) => {
        if $ins.stack_offset < 0 {
            Ok($ins.stack_offset)
        } else {
            Err(crate::Error::UnsupportedStackOffset {
                offset: $ins.offset,
                kind: $ins.kind,
                stack_offset: $ins.stack_offset,
            })
        }
    };
}
