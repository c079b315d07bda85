// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-language execution harness.
//!
//! Wraps user code with boilerplate that reads `input_data` from the
//! session workspace, runs the program (which binds a variable named
//! `result`), and writes `result` back as JSON. Workspace paths are fixed
//! strings; host paths never appear in wrapped code.

use crate::domain::Language;

/// Fixed workspace paths inside every session.
pub const INPUT_PATH: &str = "/workspace/input.json";
pub const OUTPUT_PATH: &str = "/workspace/output.json";
const PROGRAM_STEM: &str = "/workspace/program";

/// Interpreter invocation for one language. Data, not logic.
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    pub extension: &'static str,
    pub command: &'static str,
    pub args: &'static [&'static str],
}

impl LanguageProfile {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Python => Self {
                extension: "py",
                command: "python3",
                args: &[],
            },
            Language::Javascript => Self {
                extension: "js",
                command: "node",
                args: &[],
            },
            Language::Typescript => Self {
                extension: "ts",
                command: "ts-node",
                args: &[],
            },
            Language::Go => Self {
                extension: "go",
                command: "go",
                args: &["run"],
            },
            Language::Csharp => Self {
                extension: "csx",
                command: "dotnet-script",
                args: &[],
            },
        }
    }

    /// Workspace path of the wrapped program file.
    pub fn program_path(&self) -> String {
        format!("{PROGRAM_STEM}.{}", self.extension)
    }

    /// Full interpreter argument list, program path last.
    pub fn shell_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.args.iter().map(|s| s.to_string()).collect();
        args.push(self.program_path());
        args
    }
}

/// Wrap user code with the language's I/O boilerplate.
pub fn wrap_source(language: Language, user_code: &str) -> String {
    match language {
        Language::Python => format!(
            "import json\n\n\
             with open(\"{INPUT_PATH}\", \"r\", encoding=\"utf-8\") as _f:\n    \
             input_data = json.load(_f)\n\n\
             {user_code}\n\n\
             with open(\"{OUTPUT_PATH}\", \"w\", encoding=\"utf-8\") as _f:\n    \
             json.dump(result, _f)\n"
        ),
        Language::Javascript => format!(
            "const fs = require(\"fs\");\n\
             const input_data = JSON.parse(fs.readFileSync(\"{INPUT_PATH}\", \"utf8\"));\n\n\
             {user_code}\n\n\
             fs.writeFileSync(\"{OUTPUT_PATH}\", JSON.stringify(result));\n"
        ),
        Language::Typescript => format!(
            "import * as fs from \"fs\";\n\
             const input_data = JSON.parse(fs.readFileSync(\"{INPUT_PATH}\", \"utf8\"));\n\n\
             {user_code}\n\n\
             fs.writeFileSync(\"{OUTPUT_PATH}\", JSON.stringify(result));\n"
        ),
        Language::Go => format!(
            "package main\n\n\
             import (\n\t\"encoding/json\"\n\t\"os\"\n)\n\n\
             func compute(input_data map[string]interface{{}}) interface{{}} {{\n\
             \tvar result interface{{}}\n\
             {user_code}\n\
             \treturn result\n\
             }}\n\n\
             func main() {{\n\
             \traw, err := os.ReadFile(\"{INPUT_PATH}\")\n\
             \tif err != nil {{ panic(err) }}\n\
             \tvar input_data map[string]interface{{}}\n\
             \tif err := json.Unmarshal(raw, &input_data); err != nil {{ panic(err) }}\n\
             \tout, err := json.Marshal(compute(input_data))\n\
             \tif err != nil {{ panic(err) }}\n\
             \tif err := os.WriteFile(\"{OUTPUT_PATH}\", out, 0o644); err != nil {{ panic(err) }}\n\
             }}\n"
        ),
        Language::Csharp => format!(
            "using System.IO;\n\
             using System.Text.Json;\n\n\
             var input_data = JsonSerializer.Deserialize<JsonElement>(File.ReadAllText(\"{INPUT_PATH}\"));\n\
             object result = null;\n\n\
             {user_code}\n\n\
             File.WriteAllText(\"{OUTPUT_PATH}\", JsonSerializer.Serialize(result));\n"
        ),
    }
}
