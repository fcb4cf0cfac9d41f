//! Renders an [`InstallerSpec`] and its payload into one bash script.
//!
//! Layout: preamble with baked variables and the dispatch logic, the
//! payload marker, the base64 archive wrapped at 76 columns, and the end
//! sentinel. The preamble exits before the marker, so the shell never
//! reads the payload as code.

use super::spec::{InstallerCommand, InstallerSpec};
use super::{END_MARKER, MODULES_DELIMITER, PAYLOAD_MARKER};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Width of the base64 body lines.
pub const BASE64_WIDTH: usize = 76;

/// Exit status of the generated script when the install host's
/// architecture is not carried.
pub const SCRIPT_EXIT_UNSUPPORTED_ARCH: i32 = 4;

/// Quote `value` for bash using single quotes.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render the complete installer script.
#[must_use]
pub fn render_installer(spec: &InstallerSpec, payload: &[u8]) -> String {
    let mut script = String::new();
    push_header(&mut script, spec);
    push_functions(&mut script, spec);
    push_dispatch(&mut script);
    script.push_str(PAYLOAD_MARKER);
    script.push('\n');
    push_payload(&mut script, payload);
    script.push_str(END_MARKER);
    script.push('\n');
    script
}

fn push_header(script: &mut String, spec: &InstallerSpec) {
    let arches = spec.arches.as_array().map(|a| a.as_str()).join(" ");
    script.push_str(&format!(
        "#!/usr/bin/env bash\n\
         # Offline Go module installer for set {set} ({tag}).\n\
         set -euo pipefail\n\
         \n\
         EXPECTED_GO_VERSION={go}\n\
         BUILD_TIMESTAMP={ts}\n\
         BUILD_TAG={tag_q}\n\
         ARCHIVE_SHA256={digest}\n\
         SET_NAME={set_q}\n\
         TARGET_GOOS={goos}\n\
         TARGET_ARCHES={arches}\n\
         TAR_CODEC={codec}\n\
         SELF=\"${{BASH_SOURCE[0]}}\"\n\
         \n",
        set = spec.set_name,
        tag = spec.tag,
        go = shell_quote(&spec.expected_go_version),
        ts = shell_quote(&spec.tag.iso_timestamp()),
        tag_q = shell_quote(&spec.tag.id()),
        digest = shell_quote(spec.digest.as_str()),
        set_q = shell_quote(&spec.set_name),
        goos = shell_quote(&spec.goos),
        arches = shell_quote(&arches),
        codec = shell_quote(spec.codec.tar_flag()),
    ));
}

fn push_functions(script: &mut String, spec: &InstallerSpec) {
    script.push_str(&format!(
        "payload() {{\n\
         \x20   awk '/^{PAYLOAD_MARKER}$/ {{ body = 1; next }} /^{END_MARKER}$/ {{ exit }} body {{ print }}' \"$SELF\" | base64 -d\n\
         }}\n\
         \n\
         modules() {{\n\
         \x20   cat <<'{MODULES_DELIMITER}'\n\
         {modules}{MODULES_DELIMITER}\n\
         }}\n\
         \n\
         usage() {{\n\
         \x20   cat >&2 <<'__GOMODPACK_USAGE__'\n\
         {usage}__GOMODPACK_USAGE__\n\
         }}\n\
         \n",
        modules = spec.modules_text(),
        usage = spec.usage_text(),
    ));

    script.push_str("select_policy() {\n    case \"$1\" in\n");
    for arch in spec.arches.as_array() {
        let Ok(policy) = spec.policy_for(arch) else {
            continue;
        };
        let args: Vec<String> = policy.tar_args().iter().map(|a| shell_quote(a)).collect();
        script.push_str(&format!("        {arch}) POLICY=({}) ;;\n", args.join(" ")));
    }
    script.push_str(&format!(
        "        *)\n\
         \x20           echo \"unsupported architecture: $1 (artifact carries $TARGET_ARCHES)\" >&2\n\
         \x20           exit {SCRIPT_EXIT_UNSUPPORTED_ARCH}\n\
         \x20           ;;\n\
         \x20   esac\n\
         }}\n\
         \n"
    ));

    script.push_str(concat!(
        "consolidate() {\n",
        "    local root=\"$1\" out\n",
        "    out=\"$root/manifests/$SET_NAME.modules\"\n",
        "    mkdir -p \"$root/manifests\"\n",
        "    payload | tar -t \"$TAR_CODEC\" | grep -E '^manifests/[^/]+\\.manifest$' | while read -r member; do\n",
        "        cat \"$root/$member\"\n",
        "    done | { grep -Ev '^[0-9]{8}\\.[0-9]+$|^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}Z$|^[[:space:]]*$' || true; } \\\n",
        "        | LC_ALL=C sort -u >\"$out.tmp\"\n",
        "    rm -f \"$out\"\n",
        "    mv \"$out.tmp\" \"$out\"\n",
        "    chmod 0444 \"$out\"\n",
        "}\n",
        "\n",
        "install() {\n",
        "    local found arch gopath\n",
        "    found=\"$(go env GOVERSION)\"\n",
        "    if [ \"$found\" != \"$EXPECTED_GO_VERSION\" ]; then\n",
        "        echo \"found go version: $found\" >&2\n",
        "        echo \"expected go version: $EXPECTED_GO_VERSION\" >&2\n",
        "        exit 3\n",
        "    fi\n",
        "    arch=\"$(go env GOARCH)\"\n",
        "    select_policy \"$arch\"\n",
        "    gopath=\"$(go env GOPATH)\"\n",
        "    gopath=\"${gopath%%:*}\"\n",
        "    mkdir -p \"$gopath\"\n",
        "    payload | tar -x \"$TAR_CODEC\" --no-same-owner -C \"$gopath\" \"${POLICY[@]}\"\n",
        "    consolidate \"$gopath\"\n",
        "    echo \"installed $SET_NAME $BUILD_TAG for $TARGET_GOOS/$arch into $gopath\" >&2\n",
        "}\n",
        "\n",
    ));
}

fn push_dispatch(script: &mut String) {
    script.push_str("case \"${1:-}\" in\n    \"\") install ;;\n");
    for command in InstallerCommand::FLAGGED {
        let Some(flag) = command.flag() else {
            continue;
        };
        let body = match command {
            InstallerCommand::Extract => "payload",
            InstallerCommand::List => "payload | tar -t \"$TAR_CODEC\"",
            InstallerCommand::ListVerbose => "payload | tar -tv \"$TAR_CODEC\"",
            InstallerCommand::Info => "printf '%s\\n%s\\n' \"$BUILD_TIMESTAMP\" \"$ARCHIVE_SHA256\"",
            InstallerCommand::Modules => "modules",
            InstallerCommand::Install | InstallerCommand::Usage => continue,
        };
        script.push_str(&format!("    {flag}) {body} ;;\n"));
    }
    script.push_str("    *)\n        usage\n        exit 2\n        ;;\nesac\nexit 0\n\n");
}

fn push_payload(script: &mut String, payload: &[u8]) {
    let encoded = STANDARD.encode(payload);
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(BASE64_WIDTH));
        script.push_str(line);
        script.push('\n');
        rest = tail;
    }
}
