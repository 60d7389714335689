//! Typed views over a [`ConfigTree`].
//!
//! Builders fill every known field and leave absent ones empty. Only a
//! missing section is an error: it means the tree comes from a daemon whose
//! configuration layout this client does not understand.

use odr_types::{Component, GeneralOptions, Service, Subchannel};
use serde_json::Value;

use crate::error::Result;
use crate::ptree::ConfigTree;

/// Render a field as text. Absent and null fields are empty.
fn field(entry: &Value, name: &str) -> String {
    match entry.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Services in configuration order.
///
/// # Errors
///
/// Returns [`crate::Error::MissingSection`] without a `services` section.
pub fn services(tree: &ConfigTree) -> Result<Vec<Service>> {
    let section = tree.section("services")?;
    Ok(section
        .iter()
        .map(|(name, e)| Service {
            name: name.to_string(),
            id: field(e, "id"),
            label: field(e, "label"),
            shortlabel: field(e, "shortlabel"),
            pty: field(e, "pty"),
            language: field(e, "language"),
        })
        .collect())
}

/// Subchannels in configuration order.
///
/// # Errors
///
/// Returns [`crate::Error::MissingSection`] without a `subchannels` section.
pub fn subchannels(tree: &ConfigTree) -> Result<Vec<Subchannel>> {
    let section = tree.section("subchannels")?;
    Ok(section
        .iter()
        .map(|(name, e)| Subchannel {
            name: name.to_string(),
            kind: field(e, "type"),
            inputfile: field(e, "inputfile"),
            zmq_buffer: field(e, "zmq-buffer"),
            zmq_prebuffering: field(e, "zmq-prebuffering"),
            bitrate: field(e, "bitrate"),
            id: field(e, "id"),
            protection: field(e, "protection"),
            encryption: field(e, "encryption"),
            secret_key: field(e, "secret-key"),
            public_key: field(e, "public-key"),
            encoder_key: field(e, "encoder-key"),
        })
        .collect())
}

/// Components in configuration order.
///
/// # Errors
///
/// Returns [`crate::Error::MissingSection`] without a `components` section.
pub fn components(tree: &ConfigTree) -> Result<Vec<Component>> {
    let section = tree.section("components")?;
    Ok(section
        .iter()
        .map(|(name, e)| Component {
            name: name.to_string(),
            label: field(e, "label"),
            shortlabel: field(e, "shortlabel"),
            service: field(e, "service"),
            subchannel: field(e, "subchannel"),
            figtype: field(e, "figtype"),
        })
        .collect())
}

/// Options from `general`, plus the remote control port from
/// `remotecontrol`.
///
/// # Errors
///
/// Returns [`crate::Error::MissingSection`] if either section is absent.
pub fn general_options(tree: &ConfigTree) -> Result<GeneralOptions> {
    tree.section("general")?;
    tree.section("remotecontrol")?;
    let general = &tree.as_value()["general"];
    let remote = &tree.as_value()["remotecontrol"];

    Ok(GeneralOptions {
        nbframes: field(general, "nbframes"),
        statsserverport: field(general, "statsserverport"),
        writescca: field(general, "writescca"),
        tist: field(general, "tist"),
        dabmode: field(general, "dabmode"),
        syslog: field(general, "syslog"),
        telnetport: field(remote, "telnetport"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        ConfigTree::from_value(value).unwrap()
    }

    #[test]
    fn test_service_with_only_label() {
        let t = tree(json!({ "services": { "srv1": { "label": "Test" } } }));

        let services = services(&t).unwrap();
        assert_eq!(services.len(), 1);

        let srv = &services[0];
        assert_eq!(srv.name, "srv1");
        assert_eq!(srv.label, "Test");
        assert_eq!(srv.id, "");
        assert_eq!(srv.shortlabel, "");
        assert_eq!(srv.pty, "");
        assert_eq!(srv.language, "");
    }

    #[test]
    fn test_services_keep_configuration_order() {
        let t = tree(json!({ "services": {
            "zeta": { "id": "0x4daa" },
            "alpha": { "id": "0x4dab" }
        } }));

        let names: Vec<String> = services(&t).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let t = tree(json!({ "general": {} }));
        match services(&t) {
            Err(Error::MissingSection(name)) => assert_eq!(name, "services"),
            other => panic!("Expected MissingSection, got {other:?}"),
        }
        assert!(subchannels(&t).is_err());
        assert!(components(&t).is_err());
    }

    #[test]
    fn test_subchannel_fields_with_dashes_and_numbers() {
        let t = tree(json!({ "subchannels": { "sub-fu": {
            "type": "audio",
            "inputfile": "tcp://*:9000",
            "zmq-buffer": 40,
            "zmq-prebuffering": "20",
            "bitrate": 96,
            "id": 10,
            "protection": 3,
            "encryption": true,
            "secret-key": "keys/mux.sec"
        } } }));

        let sub = &subchannels(&t).unwrap()[0];
        assert_eq!(sub.kind, "audio");
        assert_eq!(sub.inputfile, "tcp://*:9000");
        assert_eq!(sub.zmq_buffer, "40");
        assert_eq!(sub.zmq_prebuffering, "20");
        assert_eq!(sub.bitrate, "96");
        assert_eq!(sub.encryption, "true");
        assert_eq!(sub.secret_key, "keys/mux.sec");
        assert_eq!(sub.public_key, "");
        assert_eq!(sub.encoder_key, "");
    }

    #[test]
    fn test_components() {
        let t = tree(json!({ "components": { "comp-fu": {
            "service": "srv-fu",
            "subchannel": "sub-fu",
            "figtype": "0x2"
        } } }));

        let comp = &components(&t).unwrap()[0];
        assert_eq!(comp.name, "comp-fu");
        assert_eq!(comp.service, "srv-fu");
        assert_eq!(comp.subchannel, "sub-fu");
        assert_eq!(comp.figtype, "0x2");
        assert_eq!(comp.label, "");
    }

    #[test]
    fn test_general_options() {
        let t = tree(json!({
            "general": { "dabmode": 1, "nbframes": 0, "tist": false, "syslog": null },
            "remotecontrol": { "telnetport": 12721 }
        }));

        let general = general_options(&t).unwrap();
        assert_eq!(general.dabmode, "1");
        assert_eq!(general.nbframes, "0");
        assert_eq!(general.tist, "false");
        assert_eq!(general.syslog, "");
        assert_eq!(general.statsserverport, "");
        assert_eq!(general.telnetport, "12721");
    }

    #[test]
    fn test_general_options_need_remotecontrol() {
        let t = tree(json!({ "general": { "dabmode": 1 } }));
        match general_options(&t) {
            Err(Error::MissingSection(name)) => assert_eq!(name, "remotecontrol"),
            other => panic!("Expected MissingSection, got {other:?}"),
        }
    }
}
