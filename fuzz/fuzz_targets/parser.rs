#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|source: &str| {
    // Anything the reader accepts must also count as complete input
    if schemer::parse_all(source).is_ok() {
        assert!(schemer::is_complete(source), "parsed incomplete input {:?}", source);
    }
});
