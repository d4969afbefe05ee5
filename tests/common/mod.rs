//! Shared schema fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

pub const DEVICE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:device="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/v1"
           xmlns:basicudi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
           xmlns:udidi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1"
           targetNamespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/v1"
           elementFormDefault="qualified">
  <xs:import namespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
             schemaLocation="basicudi.xsd"/>
  <xs:import namespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1"
             schemaLocation="udidi.xsd"/>
  <xs:element name="MDRDevice" type="device:MDRDeviceType"/>
  <xs:complexType name="MDRDeviceType">
    <xs:sequence>
      <xs:element name="MDRBasicUDI" type="basicudi:MDRBasicUDIType"/>
      <xs:element name="MDRUDIDIData" type="udidi:MDRUDIDIDataType" maxOccurs="unbounded"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

pub const BASIC_UDI_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:basicudi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
           xmlns:commondi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
           targetNamespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
           elementFormDefault="qualified">
  <xs:import namespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
             schemaLocation="common.xsd"/>
  <xs:complexType name="MDRBasicUDIType">
    <xs:sequence>
      <xs:element name="riskClass" type="basicudi:RiskClassType">
        <xs:annotation><xs:documentation>Risk class of the device</xs:documentation></xs:annotation>
      </xs:element>
      <xs:element name="model" type="xs:string"/>
      <xs:element name="identifier" type="commondi:IdentifierType"/>
      <xs:element name="animalTissues" type="xs:boolean" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
  <xs:simpleType name="RiskClassType">
    <xs:restriction base="xs:string">
      <xs:enumeration value="CLASS_I"/>
      <xs:enumeration value="CLASS_IIA"/>
      <xs:enumeration value="CLASS_IIB"/>
      <xs:enumeration value="CLASS_III"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

pub const UDI_DI_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:udidi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1"
           xmlns:commondi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
           targetNamespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1"
           elementFormDefault="qualified">
  <xs:import namespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
             schemaLocation="common.xsd"/>
  <xs:complexType name="MDRUDIDIDataType">
    <xs:sequence>
      <xs:element name="identifier" type="commondi:IdentifierType"/>
      <xs:element name="referenceNumber" type="xs:string"/>
      <xs:element name="basicUDIIdentifier" type="commondi:IdentifierType"/>
      <xs:element name="productDesignation" type="xs:string" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

pub const COMMON_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:commondi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
           targetNamespace="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
           elementFormDefault="qualified">
  <xs:complexType name="IdentifierType">
    <xs:sequence>
      <xs:element name="DICode" type="commondi:DICodeType"/>
      <xs:element name="issuingEntityCode" type="xs:string" fixed="GS1"/>
    </xs:sequence>
  </xs:complexType>
  <xs:simpleType name="DICodeType">
    <xs:restriction base="xs:string">
      <xs:minLength value="1"/>
      <xs:maxLength value="120"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

/// Captured values for one device with a single UDI-DI entry
pub const DEVICE_VALUES: &str = r#"{
  "values": {
    "MDRDevice/MDRBasicUDI/riskClass": "CLASS_IIA",
    "MDRDevice/MDRBasicUDI/model": "Test-677TAY",
    "MDRDevice/MDRBasicUDI/identifier/DICode": "599302677TAYU3",
    "MDRDevice/MDRUDIDIData/identifier/DICode": "05993020000004",
    "MDRDevice/MDRUDIDIData/referenceNumber": "05993020000004",
    "MDRDevice/MDRUDIDIData/basicUDIIdentifier/DICode": "599302677TAYU3"
  }
}"#;

/// Write the device schema family into a fresh directory
pub fn device_schema() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("basicudi.xsd"), BASIC_UDI_XSD).unwrap();
    fs::write(dir.path().join("udidi.xsd"), UDI_DI_XSD).unwrap();
    fs::write(dir.path().join("common.xsd"), COMMON_XSD).unwrap();
    let main = dir.path().join("device.xsd");
    fs::write(&main, DEVICE_XSD).unwrap();
    (dir, main)
}
