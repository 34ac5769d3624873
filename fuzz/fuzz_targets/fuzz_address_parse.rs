#![no_main]
use ipdedup::ParsedAddress;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(addr) = ParsedAddress::parse_bytes(data) {
        // Canonical text reparses to the same address and digest
        let canonical = addr.canonical();
        let again = ParsedAddress::parse(&canonical).expect("canonical form must parse");
        assert_eq!(again.canonical(), canonical);
        assert_eq!(again.digest(), addr.digest());
    }
});
