//! Compile-and-link step: write an object file via the target code
//! generator, then invoke the system linker to produce a
//! position-independent shared object, then `dlopen` it in the parent.
//!
//! [`llvm_ml_harness`] hands us GAS text directly rather than an IR module,
//! so this module's job is "write the `.s` file, shell out to the system
//! `cc` to assemble-and-link it, `dlopen` the result" — assembler/linker
//! and dynamic loader invoked as whole-program tools instead of library
//! calls.

use std::path::PathBuf;
use std::process::Command;

use libloading::{Library, Symbol};
use tempfile::TempDir;

use llvm_ml_harness::AsmModule;

use crate::error::RunnerError;

/// Raw calling convention every compiled harness function shares:
/// `(ctx, counters_start, counters_stop, out) -> ()`, all four opaque
/// pointers (`llvm_ml_harness::generator` module docs).
pub type HarnessFn =
    unsafe extern "C" fn(*mut libc::c_void, *mut libc::c_void, *mut libc::c_void, *mut libc::c_void);

/// A loaded shared object plus the resolved `baseline`/`workload` function
/// pointers. The `TempDir` and `Library` are kept alive for as long as the
/// pointers may be called.
pub struct CompiledModule {
    _dir: TempDir,
    _lib: Library,
    pub baseline: HarnessFn,
    pub workload: HarnessFn,
    /// Raw address of the `map_and_restart` trampoline (`crate::trampoline`),
    /// never called directly — only jumped to via a ptrace `rip` rewrite.
    pub trampoline_addr: u64,
}

/// Assemble and link `module` plus the fault-handling trampoline into one
/// shared object, then resolve both harness functions and the
/// trampoline's raw entry address.
pub fn compile(module: &AsmModule) -> Result<CompiledModule, RunnerError> {
    let dir = tempfile::tempdir().map_err(|e| RunnerError::Compile(e.to_string()))?;
    let asm_path = dir.path().join("block.s");
    let so_path = dir.path().join("block.so");

    let mut text = module.to_text();
    text.push('\n');
    text.push_str(&crate::trampoline::build_trampoline_asm());

    std::fs::write(&asm_path, text)
        .map_err(|e| RunnerError::Compile(format!("writing {}: {e}", asm_path.display())))?;

    link(&asm_path, &so_path)?;

    // SAFETY: `so_path` is a freshly compiled shared object under our own
    // control; it defines exactly the symbols resolved below.
    let lib = unsafe { Library::new(&so_path)? };

    let baseline: HarnessFn = unsafe {
        let sym: Symbol<HarnessFn> = lib
            .get(b"baseline\0")
            .map_err(|_| RunnerError::MissingSymbol("baseline"))?;
        *sym
    };
    let workload: HarnessFn = unsafe {
        let sym: Symbol<HarnessFn> = lib
            .get(b"workload\0")
            .map_err(|_| RunnerError::MissingSymbol("workload"))?;
        *sym
    };
    let trampoline_addr: u64 = unsafe {
        let sym: Symbol<*const ()> = lib
            .get(b"map_and_restart\0")
            .map_err(|_| RunnerError::MissingSymbol("map_and_restart"))?;
        *sym as u64
    };

    Ok(CompiledModule {
        _dir: dir,
        _lib: lib,
        baseline,
        workload,
        trampoline_addr,
    })
}

fn link(asm_path: &std::path::Path, so_path: &PathBuf) -> Result<(), RunnerError> {
    let output = Command::new("cc")
        .arg("-shared")
        .arg("-fPIC")
        .arg("-nostartfiles")
        .arg("-o")
        .arg(so_path)
        .arg(asm_path)
        .output()
        .map_err(|e| RunnerError::Link(format!("spawning cc: {e}")))?;

    if !output.status.success() {
        return Err(RunnerError::Link(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(())
}
