use std::env;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src/rsmpi.h");
    println!("cargo:rerun-if-changed=src/rsmpi.c");

    // Try to find an MPI library
    let lib = match build_probe_mpi::probe() {
        Ok(lib) => lib,
        Err(errs) => {
            println!("Could not find MPI library for various reasons:\n");
            for (i, err) in errs.iter().enumerate() {
                println!("Reason #{}:\n{}\n", i, err);
            }
            panic!();
        }
    };

    // Use `mpicc` wrapper on Unix rather than the system C compiler.
    if cfg!(windows) {
        let mut builder = cc::Build::new();
        builder.file("src/rsmpi.c");
        for inc in &lib.include_paths {
            builder.include(inc);
        }
        builder.compile("rsmpi");
    } else {
        env::set_var("CC", "mpicc");
        cc::Build::new().file("src/rsmpi.c").compile("rsmpi");
    }

    for dir in &lib.lib_paths {
        println!("cargo:rustc-link-search=native={}", dir.display());
    }
    for lib in &lib.libs {
        println!("cargo:rustc-link-lib={}", lib);
    }

    let mut builder = bindgen::builder();
    for dir in &lib.include_paths {
        builder = builder.clang_arg(format!("-I{}", dir.display()));
    }

    let bindings = builder
        .header("src/rsmpi.h")
        .emit_builtins()
        .blocklist_type("mpich_struct_mpi_long_double_int")
        .blocklist_type("max_align_t")
        .generate()
        .expect("bindgen could not generate the MPI bindings");

    let out_dir = env::var("OUT_DIR").expect("cargo did not set OUT_DIR");
    let out_file = Path::new(&out_dir).join("functions_and_types.rs");
    bindings
        .write_to_file(out_file)
        .expect("could not write the MPI bindings");
}
