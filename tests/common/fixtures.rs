//! Script bodies and upload contents for E2E tests

/// Shell prologue that reads `--input` and `--output` into `$in` and `$out`
pub const ARG_PARSER: &str = r#"in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --input) in="$2"; shift 2 ;;
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done"#;

/// Wraps every non-empty input line in a JSON object
pub const WRAP_LINES: &str = r#"awk 'NF { printf "{\"text\":\"%s\"}\n", $0 }' "$in" > "$out""#;

/// Copies input to output unchanged
pub const COPY: &str = r#"cat "$in" > "$out""#;

/// Prefixes every line with a chat template marker
pub const TEMPLATE: &str = r#"sed 's/^/[chat] /' "$in" > "$out""#;

/// Fails with a Python-style traceback on stderr
pub const TRACEBACK: &str = r#"echo 'Traceback (most recent call last):' >&2
echo "KeyError: 'messages'" >&2
exit 1"#;

/// Exits 0 without writing its output
pub const SILENT_SUCCESS: &str = "exit 0";

/// Writes an empty output file
pub const EMPTY_OUTPUT: &str = r#": > "$out""#;

/// Never finishes on its own
pub const HANG: &str = "echo 'loading model' >&2\nexec sleep 30";

/// First exported conversation
pub const EXPORT_ONE: &str = "alice: hi\nbob: hello";

/// Second exported conversation
pub const EXPORT_TWO: &str = "alice: bye";
