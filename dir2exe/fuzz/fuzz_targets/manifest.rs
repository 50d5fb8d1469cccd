#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate dir2exe_core;

use dir2exe_core::ArchiveSrc;

fuzz_target!(|data: &[u8]| {
    let mut src = data;
    if let Ok(entries) = src.read_entries() {
        let mut buf = [0; 64];
        for entry in &entries {
            let _result = src.read_entry(entry, 0, &mut buf);
        }
    }
});
