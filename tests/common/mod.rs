#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use xsdgate::{GrammarBundle, GrammarCompiler, SchemaResult, SchemaSetIdentity, SchemaSource, XsdGrammarCompiler};

/// Order schema in `urn:ex` that imports its code type from `urn:common`.
pub const ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:c="urn:common" targetNamespace="urn:ex" xmlns="urn:ex"
           elementFormDefault="qualified">
  <xs:import namespace="urn:common"/>
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Id" type="xs:integer"/>
        <xs:element name="Currency" type="c:Code" minOccurs="0"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

pub const COMMON_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:common">
  <xs:simpleType name="Code">
    <xs:restriction base="xs:string">
      <xs:length value="3"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

/// Self-contained order schema, used where files are read from disk.
pub const STANDALONE_ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:ex" xmlns="urn:ex" elementFormDefault="qualified">
  <xs:element name="Order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Id" type="xs:integer"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

/// `Bag` takes any number of children from any namespace and skips them.
pub const BAG_XSD: &str = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:ex" elementFormDefault="qualified">
  <xs:element name="Bag">
    <xs:complexType>
      <xs:sequence>
        <xs:any namespace="##any" processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"###;

/// Envelope with any number of `Body` children.
pub const ENVELOPE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Envelope">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Body" type="xs:string" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Invoice" type="xs:string"/>
</xs:schema>"#;

pub const VALID_ORDER: &str =
    r#"<Order xmlns="urn:ex"><Id>42</Id><Currency>EUR</Currency></Order>"#;

pub const INVALID_ORDER: &str = "<Order xmlns=\"urn:ex\">\n  <Id>abc</Id>\n</Order>";

pub const MALFORMED_ORDER: &str = r#"<Order xmlns="urn:ex"><Id>1</Order>"#;

pub fn compile(identity: &str, sources: &[SchemaSource]) -> SchemaResult<GrammarBundle> {
    XsdGrammarCompiler::new()
        .with_location_discovery(false)
        .compile(&SchemaSetIdentity::new(identity), sources)
}

pub fn order_sources() -> Vec<SchemaSource> {
    vec![
        SchemaSource::from_string("order.xsd", ORDER_XSD),
        SchemaSource::from_string("common.xsd", COMMON_XSD),
    ]
}

pub fn write_file(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Document directory with a schema, two valid orders, one invalid order and
/// one malformed order, plus a text file discovery must ignore.
pub struct OrderTree {
    pub dir: TempDir,
    pub schema: PathBuf,
}

impl OrderTree {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let schema = write_file(dir.path(), "schemas/order.xsd", STANDALONE_ORDER_XSD);
        write_file(dir.path(), "docs/good1.xml", r#"<Order xmlns="urn:ex"><Id>1</Id></Order>"#);
        write_file(dir.path(), "docs/nested/good2.xml", r#"<Order xmlns="urn:ex"><Id>2</Id></Order>"#);
        write_file(dir.path(), "docs/bad.xml", INVALID_ORDER);
        write_file(dir.path(), "docs/broken.xml", MALFORMED_ORDER);
        write_file(dir.path(), "docs/readme.txt", "not xml");
        Self { dir, schema }
    }

    pub fn docs(&self) -> PathBuf {
        self.dir.path().join("docs")
    }
}
