//! Integration test: open packages assembled with a plain ZIP writer

use linch_opc::opc::{rel_types, RelationshipTarget};
use linch_opc::{Error, PackageReader, PartUri, RelationshipSource};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/document.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn uri(name: &str) -> PartUri {
    PartUri::new(name).unwrap()
}

fn read_all(pkg: &mut PackageReader<impl linch_opc::opc::physical::PhysicalReader>, name: &str) -> Vec<u8> {
    let mut data = Vec::new();
    pkg.open_part(&uri(name))
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    data
}

#[test]
fn test_open_minimal_document() {
    init_logger();
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("word/document.xml", &b"<w:document/>"[..]),
        ("docProps/core.xml", &b"<cp:coreProperties/>"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();

    let names: Vec<String> = pkg
        .parts()
        .map(|p| p.unwrap().uri().to_string())
        .collect();
    assert_eq!(names, vec!["/docProps/core.xml", "/word/document.xml"]);

    let doc = pkg.part(&uri("/word/document.xml")).unwrap();
    assert_eq!(
        doc.content_type(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
    );
    assert_eq!(doc.size(), Some(13));
    assert_eq!(
        pkg.part(&uri("/docProps/core.xml")).unwrap().content_type(),
        "application/xml"
    );

    let main = pkg
        .related_parts(&RelationshipSource::Package, rel_types::OFFICE_DOCUMENT)
        .unwrap();
    assert_eq!(main, vec![uri("/word/document.xml")]);
    assert_eq!(read_all(&mut pkg, "/word/document.xml"), b"<w:document/>");

    let by_type = pkg
        .related_parts_by_type(&RelationshipSource::Package)
        .unwrap();
    assert_eq!(by_type[rel_types::CORE_PROPERTIES], vec![uri("/docProps/core.xml")]);
}

#[test]
fn test_interleaved_part_is_concatenated() {
    init_logger();
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("d.xml/[1].last.piece", &b"CD"[..]),
        ("d.xml/[0].piece", &b"AB"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    let part = pkg.part(&uri("/d.xml")).unwrap();
    assert!(part.is_interleaved());
    assert_eq!(part.size(), Some(4));
    assert_eq!(read_all(&mut pkg, "/d.xml"), b"ABCD");
}

#[test]
fn test_piece_names_are_case_insensitive() {
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("d.xml/[0].PIECE", &b"AB"[..]),
        ("d.xml/[1].Last.Piece", &b"CD"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert_eq!(read_all(&mut pkg, "/D.XML"), b"ABCD");
}

#[test]
fn test_missing_first_piece_is_malformed() {
    init_logger();
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("d.xml/[1].last.piece", &b"CD"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert!(matches!(
        pkg.open_part(&uri("/d.xml")),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_missing_last_piece_is_malformed() {
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("d.xml/[0].piece", &b"AB"[..]),
        ("d.xml/[1].piece", &b"CD"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert!(matches!(
        pkg.open_part(&uri("/d.xml")),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_missing_content_types_is_malformed() {
    init_logger();
    let bytes = build_zip(&[("word/document.xml", &b"<w:document/>"[..])]);
    assert!(matches!(
        PackageReader::from_bytes(&bytes),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_broken_content_types_fails_at_open() {
    let bytes = build_zip(&[("[Content_Types].xml", &b"<Types><Default Extension=\"xml\""[..])]);
    assert!(matches!(
        PackageReader::from_bytes(&bytes),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_override_wins_over_default() {
    let content_types = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/A/B.XML" ContentType="text/x-special"/>
</Types>"#;
    let bytes = build_zip(&[
        ("[Content_Types].xml", content_types.as_bytes()),
        ("a/b.xml", &b"<b/>"[..]),
        ("a/c.xml", &b"<c/>"[..]),
    ]);

    let pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert_eq!(pkg.part(&uri("/a/b.xml")).unwrap().content_type(), "text/x-special");
    assert_eq!(pkg.part(&uri("/a/c.xml")).unwrap().content_type(), "application/xml");
}

#[test]
fn test_unresolved_content_type_only_fails_for_that_part() {
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("a.xml", &b"<a/>"[..]),
        ("b.bin", &b"\x00\x01"[..]),
    ]);

    let pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert!(pkg.part(&uri("/a.xml")).is_ok());
    assert!(matches!(
        pkg.part(&uri("/b.bin")),
        Err(Error::UnresolvedContentType(_))
    ));
}

#[test]
fn test_relative_and_external_targets() {
    let doc_rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="./styles.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/a%20b.png"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/x" TargetMode="External"/>
</Relationships>"#;
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("word/document.xml", &b"<w:document/>"[..]),
        ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    let source = RelationshipSource::Part(uri("/word/document.xml"));
    let rels = pkg.relationships(&source).unwrap();

    let targets: Vec<RelationshipTarget> = rels
        .iter()
        .map(|r| r.resolve_target(&source).unwrap())
        .collect();
    assert_eq!(
        targets,
        vec![
            RelationshipTarget::Part(uri("/word/styles.xml")),
            RelationshipTarget::Part(uri("/media/a%20b.png")),
            RelationshipTarget::External("https://example.com/x".to_string()),
        ]
    );
}

#[test]
fn test_duplicate_relationship_id_is_malformed() {
    let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://example.com/a" Target="a.xml"/>
  <Relationship Id="rId1" Type="http://example.com/b" Target="b.xml"/>
</Relationships>"#;
    let bytes = build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", rels.as_bytes()),
        ("a.xml", &b"<a/>"[..]),
    ]);

    let mut pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert!(matches!(
        pkg.relationships(&RelationshipSource::Package),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_directory_entries_are_ignored() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.add_directory("word/", options).unwrap();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(b"<w:document/>").unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let pkg = PackageReader::from_bytes(&bytes).unwrap();
    assert_eq!(pkg.parts().count(), 1);
}
