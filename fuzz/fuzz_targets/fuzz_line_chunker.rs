#![no_main]
use ipdedup::LineChunker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the block size, the rest is the file
    let block_size = (data[0] as usize % 32) + 1;
    let content = &data[1..];

    let mut chunker = LineChunker::new();
    let mut lines: Vec<Vec<u8>> = Vec::new();
    for block in content.chunks(block_size) {
        if let Some(batch) = chunker.push_block(block) {
            lines.extend(batch.lines().map(|l| l.to_vec()));
        }
    }
    if let Some(batch) = chunker.finish() {
        lines.extend(batch.lines().map(|l| l.to_vec()));
    }

    // Same lines as splitting the whole file at once
    let mut expected: Vec<Vec<u8>> = content
        .split(|&b| b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l).to_vec())
        .collect();
    if content.last().map_or(true, |&b| b == b'\n') {
        expected.pop();
    }
    assert_eq!(lines, expected);
});
