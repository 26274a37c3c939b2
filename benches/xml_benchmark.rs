use std::sync::Arc;

use divan::Bencher;
use xsdgate::session::validate;
use xsdgate::{
    GrammarCache, GrammarCompiler, SchemaSetIdentity, SchemaSource, ValidationOptions,
    XsdGrammarCompiler,
};

fn main() {
    divan::main();
}

const ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:ex" xmlns="urn:ex" elementFormDefault="qualified">
    <xs:element name="Order">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="Id" type="xs:integer"/>
                <xs:element name="Item" maxOccurs="unbounded">
                    <xs:complexType>
                        <xs:simpleContent>
                            <xs:extension base="xs:decimal">
                                <xs:attribute name="sku" type="xs:token" use="required"/>
                            </xs:extension>
                        </xs:simpleContent>
                    </xs:complexType>
                </xs:element>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

const INVALID_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Order xmlns="urn:ex">
    <Id>not-a-number</Id>
    <Item>1.00</Item>
</Order>"#;

fn sources() -> Vec<SchemaSource> {
    vec![SchemaSource::from_string("order.xsd", ORDER_XSD)]
}

fn order_document(items: usize) -> String {
    let mut xml = String::from(r#"<Order xmlns="urn:ex"><Id>1</Id>"#);
    for i in 0..items {
        xml.push_str(&format!(r#"<Item sku="SKU-{i}">{i}.50</Item>"#));
    }
    xml.push_str("</Order>");
    xml
}

#[divan::bench]
fn compile_schema(bencher: Bencher) {
    let compiler = XsdGrammarCompiler::new().with_location_discovery(false);
    let identity = SchemaSetIdentity::new("order");
    let sources = sources();

    bencher.bench_local(|| {
        compiler
            .compile(&identity, &sources)
            .expect("Failed to compile schema")
    });
}

#[divan::bench]
fn cached_lookup(bencher: Bencher) {
    let cache = GrammarCache::new(
        Arc::new(XsdGrammarCompiler::new().with_location_discovery(false)),
        None,
    );
    let identity = SchemaSetIdentity::new("order");
    let sources = sources();
    cache.get_or_compile(&identity, &sources).unwrap();

    bencher.bench(|| cache.get_or_compile(&identity, &sources).unwrap());
}

#[divan::bench(args = [10, 100, 1000])]
fn validate_valid_document(bencher: Bencher, items: usize) {
    let bundle = XsdGrammarCompiler::new()
        .with_location_discovery(false)
        .compile(&SchemaSetIdentity::new("order"), &sources())
        .unwrap();
    let options = ValidationOptions::default();
    let document = order_document(items);

    bencher.bench_local(|| validate(&bundle, document.as_bytes(), &options));
}

#[divan::bench]
fn validate_invalid_document(bencher: Bencher) {
    let bundle = XsdGrammarCompiler::new()
        .with_location_discovery(false)
        .compile(&SchemaSetIdentity::new("order"), &sources())
        .unwrap();
    let options = ValidationOptions::default();

    bencher.bench_local(|| validate(&bundle, INVALID_XML.as_bytes(), &options));
}

#[divan::bench(threads = [1, 4])]
fn validate_shared_bundle(bencher: Bencher) {
    let bundle = Arc::new(
        XsdGrammarCompiler::new()
            .with_location_discovery(false)
            .compile(&SchemaSetIdentity::new("order"), &sources())
            .unwrap(),
    );
    let options = ValidationOptions::default();
    let document = order_document(100);

    bencher.bench(|| validate(&bundle, document.as_bytes(), &options));
}
