pub mod medications_json;
