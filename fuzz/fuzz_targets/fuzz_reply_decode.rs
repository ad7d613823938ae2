#![no_main]
use libfuzzer_sys::fuzz_target;
use yag_core::{Field, Operation, decode, parse_command};

fuzz_target!(|data: &str| {
    // Any reply line must decode to a value or an error for every field.
    for field in Field::ALL {
        let _ = decode(&Operation::Read(field), data);
    }
    if let Ok(op) = parse_command(data) {
        let _ = decode(&op, data);
    }
});
