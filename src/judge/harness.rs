//! Language-specific submission harnessing.
//!
//! User code arrives as a bare function; the judge runs whole programs. Each
//! language gets a mechanical wrapper that reads one line from stdin, decodes
//! the testcase input, invokes the detected entry function, and prints the
//! result. Only the stdin format and the printed output are contractual; the
//! wrapper text itself is free to change per language.

use super::literal::{parse_literal, Literal};
use super::{JudgeError, Language};

/// Entry-function name and parameters extracted from source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFunction {
    pub name: String,
    pub params: Vec<String>,
}

/// Extract the entry function from a Python `def` line.
pub fn extract_python_function(code: &str) -> Option<EntryFunction> {
    for line in code.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("def ") else {
            continue;
        };
        let open = rest.find('(')?;
        let close = rest[open..].find(')')? + open;
        let name = rest[..open].trim();
        if name.is_empty() || !is_identifier(name) {
            continue;
        }
        let params = rest[open + 1..close]
            .split(',')
            .map(|p| p.split(':').next().unwrap_or(p).trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        return Some(EntryFunction {
            name: name.to_string(),
            params,
        });
    }
    None
}

/// Extract the entry-function name for any supported language.
pub fn extract_function_name(code: &str, language: Language) -> Result<String, JudgeError> {
    let found = match language {
        Language::Python => extract_python_function(code).map(|f| f.name),
        Language::Javascript => scan_prefixed_identifier(code, "function "),
        Language::Go => scan_prefixed_identifier(code, "func "),
        Language::Java | Language::Cpp => scan_c_like_function(code),
    };

    found.ok_or_else(|| {
        JudgeError::InputMalformed("No valid function definition found in code".to_string())
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Find `prefix name(` anywhere in the source and return `name`.
fn scan_prefixed_identifier(code: &str, prefix: &str) -> Option<String> {
    for (idx, _) in code.match_indices(prefix) {
        let rest = &code[idx + prefix.len()..];
        let open = rest.find('(')?;
        let name = rest[..open].trim();
        if is_identifier(name) {
            return Some(name.to_string());
        }
    }
    None
}

/// Find a C/Java-style `type name(` method definition and return `name`.
fn scan_c_like_function(code: &str) -> Option<String> {
    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("//")
            || trimmed.starts_with('#')
            || trimmed.starts_with("class ")
            || trimmed.starts_with("public class")
        {
            continue;
        }
        let Some(open) = trimmed.find('(') else {
            continue;
        };
        let head = &trimmed[..open];
        let mut words: Vec<&str> = head.split_whitespace().collect();
        // Need at least a return type and a name; "if (cond)" and friends
        // yield a single keyword and are skipped.
        if words.len() < 2 {
            continue;
        }
        let name = words.pop().unwrap_or_default();
        if matches!(name, "if" | "while" | "for" | "switch" | "return") {
            continue;
        }
        if is_identifier(name) {
            return Some(name.to_string());
        }
    }
    None
}

/// Normalize a testcase input into the canonical stdin line for a language.
///
/// Python inputs must parse as a literal; JavaScript and Go inputs must parse
/// as JSON. Java and C++ receive the raw line.
pub fn normalize_stdin(language: Language, input_data: &str) -> Result<String, JudgeError> {
    let trimmed = input_data.trim();
    match language {
        Language::Python => {
            if parse_literal(trimmed).is_none() {
                return Err(JudgeError::InputMalformed(format!(
                    "Input is not a valid literal: {trimmed}"
                )));
            }
            Ok(trimmed.to_string())
        }
        Language::Javascript | Language::Go => {
            if serde_json::from_str::<serde_json::Value>(trimmed).is_err() {
                return Err(JudgeError::InputMalformed(format!(
                    "Input is not valid JSON: {trimmed}"
                )));
            }
            Ok(trimmed.to_string())
        }
        Language::Java | Language::Cpp => Ok(trimmed.to_string()),
    }
}

/// Wrap user source into a runnable program for the judge.
pub fn wrap_user_code(
    code: &str,
    language: Language,
    input_data: &str,
) -> Result<String, JudgeError> {
    match language {
        Language::Python => wrap_python(code, input_data),
        Language::Javascript => wrap_javascript(code, input_data),
        Language::Java => wrap_java(code, input_data),
        Language::Cpp => wrap_cpp(code),
        Language::Go => wrap_go(code, input_data),
    }
}

fn wrap_python(code: &str, input_data: &str) -> Result<String, JudgeError> {
    let entry = extract_python_function(code).ok_or_else(|| {
        JudgeError::InputMalformed("No valid function definition found in code".to_string())
    })?;
    let parsed = parse_literal(input_data.trim());

    let call = match parsed {
        Some(Literal::Seq(_)) => format!("result = {}(*input_data)", entry.name),
        _ => format!("result = {}(input_data)", entry.name),
    };

    Ok(format!(
        "import ast\n{code}\n\nif __name__ == \"__main__\":\n    \
         input_str = input()\n    \
         input_data = ast.literal_eval(input_str)\n    \
         {call}\n    \
         print(result)\n"
    ))
}

fn wrap_javascript(code: &str, input_data: &str) -> Result<String, JudgeError> {
    let name = extract_function_name(code, Language::Javascript)?;
    let parsed: Option<serde_json::Value> = serde_json::from_str(input_data.trim()).ok();
    let call = match parsed {
        Some(serde_json::Value::Array(_)) => format!("result = {name}(...inputData);"),
        _ => format!("result = {name}(inputData);"),
    };

    Ok(format!(
        "{code}\n\nconst readline = require('readline');\n\
         const rl = readline.createInterface({{ input: process.stdin }});\n\
         rl.on('line', (line) => {{\n  \
         const inputData = JSON.parse(line);\n  \
         let result;\n  {call}\n  \
         console.log(Array.isArray(result) ? JSON.stringify(result) : result);\n  \
         rl.close();\n}});\n"
    ))
}

fn wrap_java(code: &str, input_data: &str) -> Result<String, JudgeError> {
    let class_name = scan_prefixed_identifier_java_class(code).ok_or_else(|| {
        JudgeError::InputMalformed("No class definition found in Java code".to_string())
    })?;
    let method = scan_c_like_function(code).ok_or_else(|| {
        JudgeError::InputMalformed("No valid function definition found in code".to_string())
    })?;

    let call = if looks_like_int_sequence(input_data) {
        format!(
            "java.util.List<Integer> parsed = java.util.Arrays.stream(input.replaceAll(\"[\\\\[\\\\]()]\", \"\").split(\",\"))\n            \
             .map(String::trim).filter(s -> !s.isEmpty()).map(Integer::parseInt)\n            \
             .collect(java.util.stream.Collectors.toList());\n        \
             System.out.println(solution.{method}(parsed));"
        )
    } else {
        format!("System.out.println(solution.{method}(input));")
    };

    Ok(format!(
        "{code}\n\npublic class Main {{\n    \
         public static void main(String[] args) throws Exception {{\n        \
         java.util.Scanner sc = new java.util.Scanner(System.in);\n        \
         String input = sc.nextLine();\n        \
         {class_name} solution = new {class_name}();\n        \
         {call}\n        \
         sc.close();\n    }}\n}}\n"
    ))
}

fn wrap_cpp(code: &str) -> Result<String, JudgeError> {
    let name = scan_c_like_function(code).ok_or_else(|| {
        JudgeError::InputMalformed("No valid function definition found in code".to_string())
    })?;

    Ok(format!(
        "#include <iostream>\n#include <vector>\n#include <string>\n#include <sstream>\n\
         {code}\n\nint main() {{\n    \
         std::string input;\n    std::getline(std::cin, input);\n    \
         std::stringstream ss(input);\n    std::vector<int> nums;\n    int num;\n    \
         char ch;\n    \
         while (ss >> ch) {{ if (ch == '[' || ch == ']' || ch == ',' || ch == '(' || ch == ')') continue; ss.putback(ch); if (ss >> num) nums.push_back(num); else break; }}\n    \
         std::cout << {name}(nums) << std::endl;\n    return 0;\n}}\n"
    ))
}

fn wrap_go(code: &str, input_data: &str) -> Result<String, JudgeError> {
    let name = extract_function_name(code, Language::Go)?;
    let call = if looks_like_int_sequence(input_data) {
        format!(
            "var nums []int\n\tif err := json.Unmarshal([]byte(line), &nums); err != nil {{\n\t\tpanic(err)\n\t}}\n\tfmt.Println({name}(nums))"
        )
    } else {
        format!("fmt.Println({name}(strings.TrimSpace(line)))")
    };

    Ok(format!(
        "package main\n\nimport (\n\t\"bufio\"\n\t\"encoding/json\"\n\t\"fmt\"\n\t\"os\"\n\t\"strings\"\n)\n\n\
         {code}\n\nfunc main() {{\n\treader := bufio.NewReader(os.Stdin)\n\tline, _ := reader.ReadString('\\n')\n\t{call}\n}}\n"
    ))
}

fn scan_prefixed_identifier_java_class(code: &str) -> Option<String> {
    scan_prefixed_identifier_with(code, "class ")
}

fn scan_prefixed_identifier_with(code: &str, prefix: &str) -> Option<String> {
    for (idx, _) in code.match_indices(prefix) {
        let rest = &code[idx + prefix.len()..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if is_identifier(name) {
            return Some(name.to_string());
        }
    }
    None
}

/// Whether the input line looks like a sequence of integers (`[1, 2, 3]` or
/// `1, 2, 3`), which several wrappers decode into a typed container.
fn looks_like_int_sequence(input: &str) -> bool {
    match parse_literal(input.trim()) {
        Some(Literal::Seq(items)) => {
            !items.is_empty() && items.iter().all(|i| matches!(i, Literal::Int(_)))
        }
        _ => false,
    }
}
