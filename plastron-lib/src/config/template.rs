/// Annotated starting point for a job configuration
pub const TEMPLATE: &str = r#"{
  // Identifier for this import job; used in log messages
  "jobId": "job-1",
  // Model class each row is loaded as
  "model": "Item",
  // Metadata spreadsheet, relative to this file
  "metadata": "metadata.csv",
  // Log of items already loaded; rows listed here are skipped on the next run
  "completedLog": "completed.log.csv",
  // Where the loaded resources are written, as JSON-LD
  "output": "resources.jsonld",

  // Optional model definitions; the built-in models are used when omitted
  // "models": "models.json",
  // Optional JSON-LD dump of existing resources that rows refer to by URI
  // "repository": "repository.jsonld",

  // The transaction is kept alive at this interval (seconds) ...
  "keepAliveSeconds": 90,
  // ... and expires if not maintained for this long
  "transactionTimeoutSeconds": 180
}
"#;
