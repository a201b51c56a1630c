// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt templates shared by every provider

use crate::llm::provider::{AutoCompleteRequest, BugAnalysisRequest, IntegrationRequest};

pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant focused on helping with programming tasks.";

pub const AUTOCOMPLETE_SYSTEM_PROMPT: &str = "You are a code completion assistant. Complete the code naturally, following the context and style. Only return the completion, no explanations.";

pub const INTEGRATION_SYSTEM_PROMPT: &str = "You are a code integration specialist. You help integrate new code into existing files while maintaining code organization and style. You are particularly skilled at fixing code errors while preserving functionality.";

pub const BUG_ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a code analysis expert specializing in finding and fixing bugs.
Your task is to analyze the provided code for potential bugs, runtime errors, logical errors, and performance issues.

Rules for analysis:
1. Consider the programming language, compiler, and file type context
2. Check for:
   - Syntax errors
   - Runtime errors
   - Logic bugs
   - Memory leaks
   - Performance issues
   - Security vulnerabilities
   - Edge cases
3. If input/stdin is provided, consider how the code handles that input
4. Provide specific explanations for each bug found
5. Suggest fixes that maintain the original code's intent
6. Return ONLY the analysis result in this exact JSON format:
{
    "hasBugs": boolean,
    "explanation": "Detailed explanation of bugs found and fixes needed",
    "fixedCode": "Complete fixed version of the code"
}"#;

/// User prompt for an inline completion
pub fn autocomplete_prompt(request: &AutoCompleteRequest) -> String {
    let clipboard = if request.clipboard_text.is_empty() {
        String::new()
    } else {
        format!(
            "The user recently copied these items to their clipboard, use them if they are relevant to the completion:\n\n{}\n\n-----",
            request.clipboard_text
        )
    };

    format!(
        r#"You are a senior full-stack developer specializing in writing clean,
maintainable code and natural language content.

**Objective:**
Complete the code naturally, following the context and style.
Provide only the completion, no explanations.

**Context:**
- File type: {ext}
- Programming language: {lang}

**Rules:**
- Generate only the completion that follows the cursor position [CURSOR]
- Return plain text without markdown formatting
- Follow existing:
    • Code style and patterns
    • Indentation and formatting
    • Variable naming conventions
    • Type safety and language patterns
- Consider surrounding context for better continuity
- If intent is unclear, return an empty response
- Generate code specific to the file type and programming language specified

Context:
The following are some of the types and context available in the file.
Use these while considering how to complete the code provided.
Do not repeat or use these types in your answer.

{context}

-----

{clipboard}

**CRITICAL:**
- Do not return any other text or explanations
- Only return the code that should follow the cursor
- Ensure the code follows the syntax and conventions of {lang}

Code to complete:
{prefix}[CURSOR]{suffix}"#,
        ext = request.file_extension,
        lang = request.language_name,
        context = request.extra_context,
        clipboard = clipboard,
        prefix = request.prefix,
        suffix = request.suffix,
    )
}

/// User prompt for a whole-file rewrite
pub fn integration_prompt(request: &IntegrationRequest) -> String {
    let ext = &request.file_extension;
    let lang = &request.language_name;

    let errors = if request.errors.is_empty() {
        String::new()
    } else {
        let listed: Vec<String> = request
            .errors
            .iter()
            .map(|e| format!("- Line {}: {}", e.line, e.message))
            .collect();
        format!("\nCurrent Errors to Fix:\n{}", listed.join("\n"))
    };

    let new_code = if request.new_code.is_empty() {
        String::new()
    } else {
        format!(
            "\nNew code to integrate:\n```{}\n{}\n```\n",
            ext, request.new_code
        )
    };

    format!(
        r#"I have an existing code file and I want to add/integrate new code into it.

Language Context:
- File Type: {ext}
- Programming Language: {lang}
{errors}

User's request:
{user_prompt}

Existing code in the editor:
```{ext}
{original}
```
{new_code}
Please provide the complete updated file content with the requested changes.

Rules:
1. Keep all existing code intact unless explicitly asked to modify or remove something
2. Add new code in a logical place (e.g., new functions at the end of the file, new imports at the top)
3. Maintain consistent style and indentation
4. Return ONLY the complete file content, no explanations
5. Follow the user's instructions about what to add, modify, or remove
6. Ensure the code follows {lang} syntax and best practices
7. Fix any errors mentioned in the error list while maintaining the code's intent

Return the complete file content that I should use to replace the current file."#,
        user_prompt = request.user_prompt,
        original = request.original_code,
    )
}

/// User prompt for a bug analysis
pub fn bug_analysis_prompt(request: &BugAnalysisRequest) -> String {
    let mut extra = String::new();
    if !request.input.is_empty() {
        extra.push_str(&format!("\nUser input: {}", request.input));
    }
    if !request.stdin.is_empty() {
        extra.push_str(&format!("\nStdin: {}", request.stdin));
    }

    format!(
        "Analyze this code for bugs:\n\nFile type: {ext}\nProgramming language: {lang}{extra}\n\nCode to analyze:\n```{ext}\n{code}\n```",
        ext = request.file_extension,
        lang = request.language_name,
        extra = extra,
        code = request.code,
    )
}
