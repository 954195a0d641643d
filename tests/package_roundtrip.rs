//! Integration test: write packages and read them back

use linch_opc::opc::{rel_types, Compression, TargetMode, ZipPackageWriter};
use linch_opc::{
    Error, PackageReader, PackageWriter, PartUri, RelationshipSource, Relationships,
    WriterOptions,
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read, Write};

const DOCUMENT_CT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn uri(name: &str) -> PartUri {
    PartUri::new(name).unwrap()
}

fn new_writer() -> ZipPackageWriter<Cursor<Vec<u8>>> {
    PackageWriter::from_writer(Cursor::new(Vec::new()))
}

fn zip_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn test_roundtrip_document_package() {
    init_logger();
    let doc = uri("/word/document.xml");
    let image = uri("/word/media/image1.png");

    let mut pkg = new_writer();
    {
        let mut part = pkg.open_part(&doc, DOCUMENT_CT).unwrap();
        part.write_all(b"<w:document>").unwrap();
        part.write_all(b"</w:document>").unwrap();
        part.close().unwrap();
    }
    pkg.write_part(&image, "image/png", b"\x89PNG").unwrap();

    pkg.relationships_mut(&RelationshipSource::Package)
        .unwrap()
        .add(rel_types::OFFICE_DOCUMENT, "word/document.xml")
        .unwrap();
    let doc_rels = pkg.relationships_mut(&RelationshipSource::from(&doc)).unwrap();
    let image_id = doc_rels.add(rel_types::IMAGE, "media/image1.png").unwrap();
    let link_id = doc_rels
        .add_external(rel_types::HYPERLINK, "https://example.com")
        .unwrap();
    assert_eq!(image_id, "rId1");
    assert_eq!(link_id, "rId2");

    let bytes = pkg.finish().unwrap().into_inner();

    let mut reader = PackageReader::from_bytes(&bytes).unwrap();
    let names: Vec<String> = reader
        .parts()
        .map(|p| p.unwrap().uri().to_string())
        .collect();
    assert_eq!(names, vec!["/word/document.xml", "/word/media/image1.png"]);
    assert_eq!(reader.part(&doc).unwrap().content_type(), DOCUMENT_CT);
    assert_eq!(reader.part(&image).unwrap().content_type(), "image/png");

    let main = reader
        .related_parts(&RelationshipSource::Package, rel_types::OFFICE_DOCUMENT)
        .unwrap();
    assert_eq!(main, vec![doc.clone()]);

    let source = RelationshipSource::from(&doc);
    let rels = reader.relationships(&source).unwrap();
    assert_eq!(rels.len(), 2);
    let link = rels.get("rId2").unwrap();
    assert_eq!(link.target_mode, TargetMode::External);
    assert_eq!(
        reader.related_parts(&source, rel_types::IMAGE).unwrap(),
        vec![image.clone()]
    );

    let mut data = String::new();
    reader
        .open_part(&doc)
        .unwrap()
        .read_to_string(&mut data)
        .unwrap();
    assert_eq!(data, "<w:document></w:document>");
}

#[test]
fn test_content_types_generated_at_finish() {
    init_logger();
    let mut pkg = new_writer();
    pkg.write_part(&uri("/a.xml"), "application/xml", b"<a/>").unwrap();
    pkg.write_part(&uri("/b.txt"), "text/plain", b"b").unwrap();
    pkg.write_part(&uri("/c.txt"), "text/x-c", b"c").unwrap();
    pkg.write_part(&uri("/noext"), "application/octet-stream", b"d")
        .unwrap();
    let bytes = pkg.finish().unwrap().into_inner();

    assert_eq!(
        zip_names(&bytes),
        vec!["a.xml", "b.txt", "c.txt", "noext", "[Content_Types].xml"]
    );

    let reader = PackageReader::from_bytes(&bytes).unwrap();
    let ct = reader.content_types();
    assert_eq!(
        ct.defaults().collect::<Vec<_>>(),
        vec![
            ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
            ("txt", "text/plain"),
            ("xml", "application/xml"),
        ]
    );
    assert_eq!(
        ct.overrides()
            .map(|(u, c)| (u.to_string(), c.to_string()))
            .collect::<Vec<_>>(),
        vec![
            ("/c.txt".to_string(), "text/x-c".to_string()),
            ("/noext".to_string(), "application/octet-stream".to_string()),
        ]
    );
}

#[test]
fn test_second_open_part_is_sequencing_error() {
    let mut pkg = new_writer();
    pkg.start_part(&uri("/a.xml"), "application/xml").unwrap();
    pkg.write_all(b"<a/>").unwrap();

    let err = pkg.start_part(&uri("/b.xml"), "application/xml").unwrap_err();
    assert!(matches!(err, Error::PartStillOpen(ref name) if name == "/a.xml"));

    pkg.finish_part().unwrap();
    pkg.write_part(&uri("/b.xml"), "application/xml", b"<b/>").unwrap();
    let bytes = pkg.finish().unwrap().into_inner();

    let mut reader = PackageReader::from_bytes(&bytes).unwrap();
    assert_eq!(reader.read_part(&uri("/a.xml")).unwrap(), b"<a/>");
    assert_eq!(reader.read_part(&uri("/b.xml")).unwrap(), b"<b/>");
}

#[test]
fn test_interleaved_roundtrip() {
    init_logger();
    let options = WriterOptions::new()
        .compression(Compression::Stored)
        .piece_size(3);
    let mut pkg = PackageWriter::with_options(Cursor::new(Vec::new()), options);

    let big = uri("/big.bin");
    pkg.start_interleaved_part(&big, "application/octet-stream")
        .unwrap();
    pkg.write_all(b"0123456").unwrap();
    pkg.flush().unwrap();
    pkg.write_all(b"789").unwrap();
    pkg.finish_part().unwrap();
    let bytes = pkg.finish().unwrap().into_inner();

    assert_eq!(
        zip_names(&bytes),
        vec![
            "big.bin/[0].piece",
            "big.bin/[1].piece",
            "big.bin/[2].piece",
            "big.bin/[3].last.piece",
            "[Content_Types].xml",
        ]
    );

    let mut reader = PackageReader::from_bytes(&bytes).unwrap();
    let part = reader.part(&big).unwrap();
    assert!(part.is_interleaved());
    assert_eq!(part.size(), Some(10));
    assert_eq!(reader.read_part(&big).unwrap(), b"0123456789");
}

#[test]
fn test_caller_supplied_relationship_ids() {
    let mut rels = Relationships::new();
    rels.add_with_id("custom", rel_types::STYLES, "styles.xml", TargetMode::Internal)
        .unwrap();
    assert!(matches!(
        rels.add_with_id("custom", rel_types::STYLES, "other.xml", TargetMode::Internal),
        Err(Error::InvalidRelationship(_))
    ));

    let doc = uri("/word/document.xml");
    let mut pkg = new_writer();
    pkg.write_part(&doc, DOCUMENT_CT, b"<w:document/>").unwrap();
    pkg.write_part(&uri("/word/styles.xml"), "application/xml", b"<w:styles/>")
        .unwrap();
    pkg.set_relationships(&RelationshipSource::from(&doc), rels)
        .unwrap();
    let bytes = pkg.finish().unwrap().into_inner();

    let mut reader = PackageReader::from_bytes(&bytes).unwrap();
    let rels = reader.relationships(&RelationshipSource::from(&doc)).unwrap();
    let styles = rels.get("custom").unwrap();
    assert_eq!(styles.target, "styles.xml");
    assert_eq!(
        reader
            .related_parts(&RelationshipSource::from(&doc), rel_types::STYLES)
            .unwrap(),
        vec![uri("/word/styles.xml")]
    );
}

#[test]
fn test_create_and_open_file() {
    init_logger();
    let path = std::env::temp_dir().join(format!("linch-opc-{}.zip", std::process::id()));

    let mut pkg = PackageWriter::create(&path).unwrap();
    pkg.write_part(&uri("/hello.txt"), "text/plain", b"Hello, World!")
        .unwrap();
    let mut file = pkg.finish().unwrap();
    file.flush().unwrap();
    drop(file);

    let mut reader = PackageReader::open(&path).unwrap();
    assert_eq!(
        reader.read_part(&uri("/hello.txt")).unwrap(),
        b"Hello, World!"
    );
    let _ = std::fs::remove_file(&path);
}
