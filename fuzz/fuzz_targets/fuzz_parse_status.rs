#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The inverter serves the page as plain text; tolerate any byte soup
    let body = String::from_utf8_lossy(data);
    let _ = zevermon::client::parse_status_page(&body);
});
