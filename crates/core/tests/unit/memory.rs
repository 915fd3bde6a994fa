//! Memory Section and Layout Tests.
//!
//! Verifies section construction rules, permission parsing and the lookup and
//! validation behaviour of [`MemoryLayout`].

use pretty_assertions::assert_eq;
use rstest::rstest;
use stepwise_core::EmulatorError;
use stepwise_core::common::constants::{MAX_SECTION_SIZE, PAGE_SIZE, STACK_BASE, TEXT_BASE};
use stepwise_core::memory::{MemoryLayout, MemorySection, Permission};

fn rw() -> Permission {
    Permission::READ | Permission::WRITE
}

fn section(name: &str, address: u64, size: u64) -> MemorySection {
    MemorySection::new(name, address, size, rw()).unwrap()
}

fn reserved(extra: Vec<MemorySection>) -> MemoryLayout {
    let mut sections = vec![
        section("text", 0x1000, 0x1000),
        section("data", 0x2000, 0x1000),
        section("stack", 0x3000, 0x1000),
    ];
    sections.extend(extra);
    MemoryLayout::new(sections)
}

// ══════════════════════════════════════════════════════════
// 1. Permissions
// ══════════════════════════════════════════════════════════

#[rstest]
#[case("READ", Permission::READ)]
#[case("read|write", Permission::READ | Permission::WRITE)]
#[case("READ, EXEC", Permission::READ | Permission::EXEC)]
#[case("ALL", Permission::all())]
#[case("", Permission::empty())]
fn permission_parses(#[case] text: &str, #[case] expected: Permission) {
    assert_eq!(text.parse::<Permission>().unwrap(), expected);
}

#[test]
fn permission_rejects_unknown_flag() {
    let err = "READ|SHARED".parse::<Permission>().unwrap_err();
    assert!(err.to_string().contains("SHARED"), "unexpected message: {err}");
}

#[test]
fn permission_display_is_rwx_triplet() {
    assert_eq!(Permission::all().to_string(), "rwx");
    assert_eq!(Permission::WRITE.to_string(), "-w-");
    assert_eq!(Permission::empty().to_string(), "---");
}

// ══════════════════════════════════════════════════════════
// 2. Sections
// ══════════════════════════════════════════════════════════

#[rstest]
#[case("", 0x1000, 0x1000)]
#[case("   ", 0x1000, 0x1000)]
#[case("zero", 0x1000, 0)]
#[case("wrap", u64::MAX - 0xFFF, 0x2000)]
fn section_rejects_invalid_geometry(#[case] name: &str, #[case] address: u64, #[case] size: u64) {
    let result = MemorySection::new(name, address, size, rw());
    assert!(matches!(result, Err(EmulatorError::InvalidSection { .. })));
}

#[test]
fn section_geometry() {
    let s = section("data", 0x2000, 0x1000);
    assert_eq!(s.end(), 0x3000);
    assert!(s.contains(0x2000));
    assert!(s.contains(0x2FFF));
    assert!(!s.contains(0x3000));
    assert_eq!(s.to_string(), "data [0x2000-0x3000) rw-");
}

#[test]
fn section_content_is_kept() {
    let s = section("data", 0x2000, 0x1000).with_content(vec![1, 2, 3]).unwrap();
    assert_eq!(s.content(), Some(&[1u8, 2, 3][..]));
}

// ══════════════════════════════════════════════════════════
// 3. Layout lookup
// ══════════════════════════════════════════════════════════

#[test]
fn default_layout_holds_reserved_sections_back_to_back() {
    let layout = MemoryLayout::default_layout();
    let names: Vec<&str> = layout.iter().map(MemorySection::name).collect();
    assert_eq!(names, ["text", "data", "stack"]);

    let text = layout.find("text").unwrap();
    assert_eq!(text.address(), TEXT_BASE);
    assert_eq!(text.permission(), Permission::READ | Permission::EXEC);
    assert_eq!(layout.find("stack").unwrap().address(), STACK_BASE);
    assert_eq!(layout.find("data").unwrap().end(), STACK_BASE);
    assert_eq!(layout.lowest_address(), Some(TEXT_BASE));
    layout.check_reserved().unwrap();
    layout.validate().unwrap();
}

#[test]
fn find_reports_missing_and_duplicate_names() {
    let layout = reserved(vec![section("heap", 0x8000, 0x1000), section("heap", 0x9000, 0x1000)]);
    assert!(matches!(layout.find("bss"), Err(EmulatorError::SectionNotFound(n)) if n == "bss"));
    let err = layout.find("heap").unwrap_err();
    assert!(matches!(&err, EmulatorError::AmbiguousSection(n) if n == "heap"));
    assert!(err.is_consistency_violation());
}

#[test]
fn require_names_the_missing_section() {
    let layout = MemoryLayout::new(vec![section("text", 0x1000, 0x1000), section("data", 0x2000, 0x1000)]);
    let err = layout.check_reserved().unwrap_err();
    assert!(matches!(err, EmulatorError::MissingRequiredSection(n) if n == "stack"));
}

#[test]
fn duplicated_reserved_section_is_ambiguous() {
    let layout = reserved(vec![section("data", 0x8000, 0x1000)]);
    assert!(matches!(layout.check_reserved(), Err(EmulatorError::AmbiguousSection(n)) if n == "data"));
}

#[test]
fn section_at_finds_containing_section() {
    let layout = reserved(Vec::new());
    assert_eq!(layout.section_at(0x2800).map(MemorySection::name), Some("data"));
    assert!(layout.section_at(0x4000).is_none());
}

// ══════════════════════════════════════════════════════════
// 4. Layout validation
// ══════════════════════════════════════════════════════════

#[test]
fn validate_rejects_overlap() {
    let layout = reserved(vec![section("heap", 0x2800, 0x1000)]);
    let err = layout.validate().unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidSection { name, .. } if name == "heap"));
}

#[rstest]
#[case(0x1800, PAGE_SIZE)]
#[case(0x8000, 0x800)]
fn validate_rejects_unaligned(#[case] address: u64, #[case] size: u64) {
    let layout = MemoryLayout::new(vec![section("odd", address, size)]);
    assert!(layout.validate().is_err());
}

#[test]
fn validate_caps_section_size() {
    let at_limit = reserved(vec![section("heap", 0x1000_0000, MAX_SECTION_SIZE)]);
    at_limit.validate().unwrap();

    let huge = reserved(vec![section("heap", 0x1_0000_0000, 1 << 40)]);
    let err = huge.validate().unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidSection { name, .. } if name == "heap"));
}

#[test]
fn validate_does_not_require_reserved_sections() {
    let layout = MemoryLayout::new(vec![section("scratch", 0x1000, 0x1000)]);
    layout.validate().unwrap();
}

#[test]
fn layout_display_lists_one_section_per_line() {
    let layout = reserved(Vec::new());
    let text = layout.to_string();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("text [0x1000-0x2000)"));
}
